//! # In-Memory Engine
//!
//! Sharded concurrent key/value storage with TTL-aware lookups, backed by a
//! pluggable [`EvictionPolicy`] and an optional [`DclHandle`] for durability.
//!
//! ## Usage
//!
//! - Use `MemoryEngine::new(capacity)` for a fresh engine with no durability.
//! - Use `MemoryEngine::with_dcl(capacity, path)` to enable the append-only
//!   log and replay any existing records from `path` before returning.
//! - Use `start_sweeper` to enable active TTL cleanup in the background.
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: per-shard locks reduce contention under concurrency.
//! 2. **Arc-backed Values**: values are `Arc<[u8]>` to avoid copies on read.
//! 3. **Decoupled Eviction**: recency tracking lives in a separate
//!    [`EvictionPolicy`], never under the shard lock.
//! 4. **TTL Fast Path**: expiration is checked on access for O(1) reads.
//! 5. **Strategy Pattern**: implements [`Engine`] to keep callers decoupled
//!    from the storage backend.

use std::hash::{BuildHasher, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::RwLock;

use atomkv_common::{AtomKvError, AtomKvResult};

use crate::dcl::{self, DclHandle};
use crate::engine::{Engine, TtlStatus, TypeTag};
use crate::eviction::{EvictionPolicy, LruPolicy};
use crate::pattern::compile_glob;

const DEFAULT_SHARD_MULTIPLIER: usize = 4;
const NO_EXPIRY: i64 = -1;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<[u8]>,
    expire_at_millis: i64,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expire_at_millis == NO_EXPIRY || self.expire_at_millis > now
    }
}

type ShardMap = HashMap<Box<[u8]>, Entry, RandomState>;

struct Shard {
    inner: RwLock<ShardMap>,
}

/// Handle for the background TTL sweeper. Dropping a running handle leaks
/// the thread; call `stop` to shut it down cleanly.
pub struct SweepHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Sharded, TTL-aware, LRU-bounded in-memory key/value store.
pub struct MemoryEngine {
    shards: Vec<Shard>,
    shard_mask: usize,
    hash_state: RandomState,
    eviction: LruPolicy,
    len: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    dcl: Option<DclHandle>,
}

impl MemoryEngine {
    /// Creates an engine with no durability, bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self::build(capacity, None))
    }

    /// Creates an engine backed by a durable command log at `path`,
    /// replaying any existing records before the writer thread starts.
    pub fn with_dcl(capacity: usize, path: &Path) -> std::io::Result<Arc<Self>> {
        let mut engine = Self::build(capacity, None);
        engine.replay(path)?;
        engine.dcl = Some(DclHandle::spawn(path)?);
        Ok(Arc::new(engine))
    }

    fn build(capacity: usize, dcl: Option<DclHandle>) -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let shard_count = (threads * DEFAULT_SHARD_MULTIPLIER).next_power_of_two();
        let hash_state = RandomState::new();

        let shards = (0..shard_count)
            .map(|_| Shard {
                inner: RwLock::new(HashMap::with_hasher(hash_state.clone())),
            })
            .collect();

        MemoryEngine {
            shards,
            shard_mask: shard_count - 1,
            hash_state,
            eviction: LruPolicy::new(capacity),
            len: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            dcl,
        }
    }

    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = self.hash_state.build_hasher();
        hasher.write(key);
        (hasher.finish() as usize) & self.shard_mask
    }

    fn shard_for(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    fn dcl_enqueue(&self, line: String) {
        if let Some(dcl) = &self.dcl {
            dcl.enqueue(line);
        }
    }

    /// Replays records from `path` without re-logging them. Called once,
    /// before the log writer thread is spawned.
    fn replay(&self, path: &Path) -> std::io::Result<()> {
        dcl::replay(path, |verb, args| self.apply_replay_record(verb, args))
    }

    fn apply_replay_record(&self, verb: &str, args: &[Vec<u8>]) {
        match verb {
            "SET" => match args.len() {
                2 => self.set_impl(&args[0], &args[1], None, false),
                4 if args[2].eq_ignore_ascii_case(b"PX") => match parse_u64(&args[3]) {
                    Some(ms) => self.set_impl(&args[0], &args[1], Some(ms), false),
                    None => tracing::warn!("skipping malformed SET record in durable log"),
                },
                _ => tracing::warn!("skipping malformed SET record in durable log"),
            },
            "DEL" if args.len() == 1 => {
                self.del_impl(&args[0], false);
            }
            "PERSIST" if args.len() == 1 => {
                self.persist_impl(&args[0], false);
            }
            "EXPIRE" if args.len() == 2 => match parse_u64(&args[1]) {
                Some(seconds) => {
                    self.expire_impl(&args[0], seconds, false);
                }
                None => tracing::warn!("skipping malformed EXPIRE record in durable log"),
            },
            "APPEND" if args.len() == 2 => {
                self.append_impl(&args[0], &args[1], false);
            }
            "INCR" if args.len() == 1 => {
                let _ = self.incr_decr_impl(&args[0], 1, false);
            }
            "DECR" if args.len() == 1 => {
                let _ = self.incr_decr_impl(&args[0], -1, false);
            }
            "RENAME" if args.len() == 2 => {
                self.rename_impl(&args[0], &args[1], false);
            }
            "MSET" if !args.is_empty() && args.len() % 2 == 0 => {
                let pairs: Vec<(&[u8], &[u8])> = args
                    .chunks_exact(2)
                    .map(|pair| (pair[0].as_slice(), pair[1].as_slice()))
                    .collect();
                self.mset_impl(&pairs, false);
            }
            "FLUSHALL" if args.is_empty() => {
                self.flushall_impl(false);
            }
            other => tracing::warn!(verb = other, "skipping unknown verb in durable log"),
        }
    }

    fn run_eviction(&self, log: bool) {
        loop {
            let current = self.len.load(Ordering::Relaxed);
            let Some(victim) = self.eviction.evict_if_needed(current) else {
                break;
            };

            let removed = {
                let mut map = self.shard_for(&victim).inner.write();
                map.remove(victim.as_ref()).is_some()
            };

            if removed {
                self.len.fetch_sub(1, Ordering::Relaxed);
                if log {
                    self.dcl_enqueue(dcl::encode_del(&victim));
                }
            }
        }
    }

    fn get_impl(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        let now = now_millis();
        let mut map = self.shard_for(key).inner.write();

        match map.get(key) {
            Some(entry) if entry.is_live(now) => {
                let value = entry.value.clone();
                drop(map);
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.eviction.record_access(key);
                Some(value)
            }
            Some(_) => {
                map.remove(key);
                drop(map);
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                drop(map);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set_impl(&self, key: &[u8], value: &[u8], ttl_ms: Option<u64>, log: bool) {
        let expire_at = ttl_ms.map(|ms| now_millis() + ms as i64).unwrap_or(NO_EXPIRY);
        let entry = Entry {
            value: Arc::from(value),
            expire_at_millis: expire_at,
        };

        {
            let mut map = self.shard_for(key).inner.write();
            if map.insert(key.into(), entry).is_none() {
                self.len.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.eviction.record_put(key);

        if log {
            self.dcl_enqueue(dcl::encode_set(key, value, ttl_ms));
        }
        self.run_eviction(log);
    }

    fn del_impl(&self, key: &[u8], log: bool) -> bool {
        let now = now_millis();
        let mut map = self.shard_for(key).inner.write();

        match map.remove(key) {
            Some(entry) => {
                drop(map);
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(key);
                let was_live = entry.is_live(now);
                if log && was_live {
                    self.dcl_enqueue(dcl::encode_del(key));
                }
                was_live
            }
            None => false,
        }
    }

    fn exists_impl(&self, key: &[u8]) -> bool {
        let now = now_millis();
        let mut map = self.shard_for(key).inner.write();

        match map.get(key) {
            Some(entry) if entry.is_live(now) => true,
            Some(_) => {
                map.remove(key);
                drop(map);
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(key);
                false
            }
            None => false,
        }
    }

    fn ttl_impl(&self, key: &[u8]) -> TtlStatus {
        let now = now_millis();
        let mut map = self.shard_for(key).inner.write();

        match map.get(key) {
            Some(entry) if entry.is_live(now) => {
                if entry.expire_at_millis == NO_EXPIRY {
                    TtlStatus::NoExpiry
                } else {
                    TtlStatus::ExpiresIn(entry.expire_at_millis - now)
                }
            }
            Some(_) => {
                map.remove(key);
                drop(map);
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(key);
                TtlStatus::Missing
            }
            None => TtlStatus::Missing,
        }
    }

    fn persist_impl(&self, key: &[u8], log: bool) -> bool {
        let now = now_millis();
        let mut map = self.shard_for(key).inner.write();

        match map.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                if entry.expire_at_millis == NO_EXPIRY {
                    false
                } else {
                    entry.expire_at_millis = NO_EXPIRY;
                    drop(map);
                    if log {
                        self.dcl_enqueue(dcl::encode_persist(key));
                    }
                    true
                }
            }
            Some(_) => {
                map.remove(key);
                drop(map);
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(key);
                false
            }
            None => false,
        }
    }

    fn expire_impl(&self, key: &[u8], seconds: u64, log: bool) -> bool {
        let now = now_millis();
        let mut map = self.shard_for(key).inner.write();

        match map.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expire_at_millis = now + (seconds as i64).saturating_mul(1000);
                drop(map);
                if log {
                    self.dcl_enqueue(dcl::encode_expire(key, seconds));
                }
                true
            }
            Some(_) => {
                map.remove(key);
                drop(map);
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(key);
                false
            }
            None => false,
        }
    }

    fn append_impl(&self, key: &[u8], suffix: &[u8], log: bool) -> usize {
        let now = now_millis();
        let new_len;
        let created;

        {
            let mut map = self.shard_for(key).inner.write();
            match map.get_mut(key) {
                Some(entry) if entry.is_live(now) => {
                    let mut combined = Vec::with_capacity(entry.value.len() + suffix.len());
                    combined.extend_from_slice(&entry.value);
                    combined.extend_from_slice(suffix);
                    new_len = combined.len();
                    entry.value = Arc::from(combined);
                    created = false;
                }
                maybe_expired => {
                    if maybe_expired.is_some() {
                        map.remove(key);
                        self.len.fetch_sub(1, Ordering::Relaxed);
                        self.eviction.record_remove(key);
                    }
                    new_len = suffix.len();
                    map.insert(
                        key.into(),
                        Entry {
                            value: Arc::from(suffix),
                            expire_at_millis: NO_EXPIRY,
                        },
                    );
                    self.len.fetch_add(1, Ordering::Relaxed);
                    created = true;
                }
            }
        }

        self.eviction.record_put(key);
        if log {
            self.dcl_enqueue(dcl::encode_append(key, suffix));
        }
        if created {
            self.run_eviction(log);
        }
        new_len
    }

    fn incr_decr_impl(&self, key: &[u8], delta: i64, log: bool) -> AtomKvResult<i64> {
        let now = now_millis();
        let new_value;
        let created;

        {
            let mut map = self.shard_for(key).inner.write();
            match map.get_mut(key) {
                Some(entry) if entry.is_live(now) => {
                    let current: i64 = std::str::from_utf8(&entry.value)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or(AtomKvError::NotAnInteger)?;
                    new_value = current.checked_add(delta).ok_or(AtomKvError::NotAnInteger)?;
                    entry.value = Arc::from(new_value.to_string().into_bytes());
                    created = false;
                }
                maybe_expired => {
                    if maybe_expired.is_some() {
                        map.remove(key);
                        self.len.fetch_sub(1, Ordering::Relaxed);
                        self.eviction.record_remove(key);
                    }
                    new_value = delta;
                    map.insert(
                        key.into(),
                        Entry {
                            value: Arc::from(new_value.to_string().into_bytes()),
                            expire_at_millis: NO_EXPIRY,
                        },
                    );
                    self.len.fetch_add(1, Ordering::Relaxed);
                    created = true;
                }
            }
        }

        self.eviction.record_put(key);
        if log {
            let line = if delta >= 0 {
                dcl::encode_incr(key)
            } else {
                dcl::encode_decr(key)
            };
            self.dcl_enqueue(line);
        }
        if created {
            self.run_eviction(log);
        }
        Ok(new_value)
    }

    fn strlen_impl(&self, key: &[u8]) -> usize {
        let now = now_millis();
        let map = self.shard_for(key).inner.read();
        match map.get(key) {
            Some(entry) if entry.is_live(now) => entry.value.len(),
            _ => 0,
        }
    }

    fn key_type_impl(&self, key: &[u8]) -> TypeTag {
        let now = now_millis();
        let map = self.shard_for(key).inner.read();
        match map.get(key) {
            Some(entry) if entry.is_live(now) => {
                if entry.expire_at_millis != NO_EXPIRY {
                    TypeTag::TtlKey
                } else if looks_numeric(&entry.value) {
                    TypeTag::Number
                } else {
                    TypeTag::String
                }
            }
            _ => TypeTag::None,
        }
    }

    fn keys_impl(&self, pattern: &str) -> Vec<Box<[u8]>> {
        let now = now_millis();
        let re = compile_glob(pattern);
        let mut out = Vec::new();

        for shard in &self.shards {
            let map = shard.inner.read();
            for (key, entry) in map.iter() {
                if entry.is_live(now) && re.is_match(key) {
                    out.push(key.clone());
                }
            }
        }
        out
    }

    fn snapshot_impl(&self) -> Vec<(Box<[u8]>, Arc<[u8]>)> {
        let now = now_millis();
        let mut out = Vec::new();
        for shard in &self.shards {
            let map = shard.inner.read();
            for (key, entry) in map.iter() {
                if entry.is_live(now) {
                    out.push((key.clone(), entry.value.clone()));
                }
            }
        }
        out
    }

    fn key_count_impl(&self) -> usize {
        let now = now_millis();
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .inner
                    .read()
                    .values()
                    .filter(|entry| entry.is_live(now))
                    .count()
            })
            .sum()
    }

    fn mset_impl(&self, pairs: &[(&[u8], &[u8])], log: bool) {
        for (key, value) in pairs {
            let mut map = self.shard_for(key).inner.write();
            let entry = Entry {
                value: Arc::from(*value),
                expire_at_millis: NO_EXPIRY,
            };
            if map.insert((*key).into(), entry).is_none() {
                self.len.fetch_add(1, Ordering::Relaxed);
            }
            drop(map);
            self.eviction.record_put(key);
        }

        if log {
            self.dcl_enqueue(dcl::encode_mset(pairs));
        }
        self.run_eviction(log);
    }

    fn rename_impl(&self, src: &[u8], dst: &[u8], log: bool) -> bool {
        let now = now_millis();
        let src_idx = self.shard_index(src);
        let dst_idx = self.shard_index(dst);

        let outcome = if src_idx == dst_idx {
            let mut map = self.shards[src_idx].inner.write();
            rename_same_shard(&mut map, src, dst, now)
        } else if src_idx < dst_idx {
            let mut src_map = self.shards[src_idx].inner.write();
            let mut dst_map = self.shards[dst_idx].inner.write();
            rename_cross_shard(&mut src_map, &mut dst_map, src, dst, now)
        } else {
            let mut dst_map = self.shards[dst_idx].inner.write();
            let mut src_map = self.shards[src_idx].inner.write();
            rename_cross_shard(&mut src_map, &mut dst_map, src, dst, now)
        };

        match outcome {
            RenameOutcome::Renamed { dst_overwritten } => {
                self.eviction.record_remove(src);
                self.eviction.record_put(dst);
                if dst_overwritten {
                    self.len.fetch_sub(1, Ordering::Relaxed);
                }
                if log {
                    self.dcl_enqueue(dcl::encode_rename(src, dst));
                }
                true
            }
            RenameOutcome::ExpiredSrc => {
                self.len.fetch_sub(1, Ordering::Relaxed);
                self.eviction.record_remove(src);
                false
            }
            RenameOutcome::NotFound => false,
        }
    }

    fn flushall_impl(&self, log: bool) {
        for shard in &self.shards {
            shard.inner.write().clear();
        }
        self.len.store(0, Ordering::Relaxed);
        self.eviction.clear();
        if log {
            self.dcl_enqueue(dcl::encode_flushall());
        }
    }

    /// Removes entries whose TTL has passed as of `now_ms`. Used by the
    /// periodic sweeper; does not write to the durable log since expiry is
    /// reconstructed implicitly from `expireAtMillis` on replay.
    pub fn sweep_expired(&self, now_ms: i64) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let expired: Vec<Box<[u8]>> = {
                let map = shard.inner.read();
                map.iter()
                    .filter(|(_, entry)| !entry.is_live(now_ms))
                    .map(|(key, _)| key.clone())
                    .collect()
            };

            if expired.is_empty() {
                continue;
            }

            let mut map = shard.inner.write();
            for key in &expired {
                if map.remove(key.as_ref()).is_some() {
                    removed += 1;
                }
            }
            drop(map);
            for key in &expired {
                self.eviction.record_remove(key);
            }
        }
        if removed > 0 {
            self.len.fetch_sub(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Starts the periodic TTL sweeper on its own thread.
    pub fn start_sweeper(self: &Arc<Self>) -> SweepHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let engine = Arc::clone(self);

        let join = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::Acquire) {
                std::thread::sleep(SWEEP_INTERVAL);
                if stop_thread.load(Ordering::Acquire) {
                    break;
                }
                engine.sweep_expired(now_millis());
            }
        });

        SweepHandle {
            stop,
            join: Some(join),
        }
    }
}

/// Outcome of a rename attempt, distinguishing a physically-removed expired
/// `src` from a plain miss so `rename_impl` can keep `len` and the eviction
/// policy's tracked set in sync with the map either way.
enum RenameOutcome {
    Renamed { dst_overwritten: bool },
    ExpiredSrc,
    NotFound,
}

fn rename_same_shard(map: &mut ShardMap, src: &[u8], dst: &[u8], now: i64) -> RenameOutcome {
    match map.get(src) {
        Some(entry) if entry.is_live(now) => {}
        Some(_) => {
            map.remove(src);
            return RenameOutcome::ExpiredSrc;
        }
        None => return RenameOutcome::NotFound,
    }
    let entry = map.remove(src).expect("checked live above");
    RenameOutcome::Renamed {
        dst_overwritten: map.insert(dst.into(), entry).is_some(),
    }
}

fn rename_cross_shard(
    src_map: &mut ShardMap,
    dst_map: &mut ShardMap,
    src: &[u8],
    dst: &[u8],
    now: i64,
) -> RenameOutcome {
    match src_map.get(src) {
        Some(entry) if entry.is_live(now) => {}
        Some(_) => {
            src_map.remove(src);
            return RenameOutcome::ExpiredSrc;
        }
        None => return RenameOutcome::NotFound,
    }
    let entry = src_map.remove(src).expect("checked live above");
    RenameOutcome::Renamed {
        dst_overwritten: dst_map.insert(dst.into(), entry).is_some(),
    }
}

fn looks_numeric(value: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(value) else {
        return false;
    };
    text.parse::<i64>().is_ok() || text.parse::<f64>().is_ok()
}

fn parse_u64(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

impl Engine for MemoryEngine {
    fn get(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        self.get_impl(key)
    }

    fn set(&self, key: &[u8], value: &[u8], ttl_ms: Option<u64>) {
        self.set_impl(key, value, ttl_ms, true)
    }

    fn del(&self, key: &[u8]) -> bool {
        self.del_impl(key, true)
    }

    fn exists(&self, key: &[u8]) -> bool {
        self.exists_impl(key)
    }

    fn ttl(&self, key: &[u8]) -> TtlStatus {
        self.ttl_impl(key)
    }

    fn persist(&self, key: &[u8]) -> bool {
        self.persist_impl(key, true)
    }

    fn expire(&self, key: &[u8], seconds: u64) -> bool {
        self.expire_impl(key, seconds, true)
    }

    fn append(&self, key: &[u8], suffix: &[u8]) -> usize {
        self.append_impl(key, suffix, true)
    }

    fn incr(&self, key: &[u8]) -> AtomKvResult<i64> {
        self.incr_decr_impl(key, 1, true)
    }

    fn decr(&self, key: &[u8]) -> AtomKvResult<i64> {
        self.incr_decr_impl(key, -1, true)
    }

    fn strlen(&self, key: &[u8]) -> usize {
        self.strlen_impl(key)
    }

    fn key_type(&self, key: &[u8]) -> TypeTag {
        self.key_type_impl(key)
    }

    fn keys(&self, pattern: &str) -> Vec<Box<[u8]>> {
        self.keys_impl(pattern)
    }

    fn key_count(&self) -> usize {
        self.key_count_impl()
    }

    fn mget(&self, keys: &[&[u8]]) -> Vec<Option<Arc<[u8]>>> {
        keys.iter().map(|key| self.get_impl(key)).collect()
    }

    fn snapshot(&self) -> Vec<(Box<[u8]>, Arc<[u8]>)> {
        self.snapshot_impl()
    }

    fn mset(&self, pairs: &[(&[u8], &[u8])]) {
        self.mset_impl(pairs, true)
    }

    fn rename(&self, src: &[u8], dst: &[u8]) -> bool {
        self.rename_impl(src, dst, true)
    }

    fn flushall(&self) {
        self.flushall_impl(true)
    }

    fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let engine = MemoryEngine::new(100);
        engine.set(b"alpha", b"value", None);
        assert_eq!(engine.get(b"alpha").as_deref(), Some(&b"value"[..]));
    }

    #[test]
    fn delete_removes_key() {
        let engine = MemoryEngine::new(100);
        engine.set(b"alpha", b"value", None);
        assert!(engine.del(b"alpha"));
        assert!(engine.get(b"alpha").is_none());
        assert!(!engine.del(b"alpha"));
    }

    #[test]
    fn ttl_expires_and_reports_missing() {
        let engine = MemoryEngine::new(100);
        engine.set(b"alpha", b"value", Some(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(engine.get(b"alpha").is_none());
        assert_eq!(engine.ttl(b"alpha"), TtlStatus::Missing);
    }

    #[test]
    fn persist_clears_ttl() {
        let engine = MemoryEngine::new(100);
        engine.set(b"alpha", b"value", Some(10_000));
        assert!(engine.persist(b"alpha"));
        assert_eq!(engine.ttl(b"alpha"), TtlStatus::NoExpiry);
        assert!(!engine.persist(b"alpha"));
    }

    #[test]
    fn append_creates_or_extends() {
        let engine = MemoryEngine::new(100);
        assert_eq!(engine.append(b"k", b"ab"), 2);
        assert_eq!(engine.append(b"k", b"cd"), 4);
        assert_eq!(engine.get(b"k").as_deref(), Some(&b"abcd"[..]));
    }

    #[test]
    fn incr_and_decr_semantics() {
        let engine = MemoryEngine::new(100);
        engine.set(b"n", b"41", None);
        assert_eq!(engine.incr(b"n").unwrap(), 42);
        assert_eq!(engine.decr(b"n").unwrap(), 41);
        engine.set(b"n", b"abc", None);
        assert!(engine.incr(b"n").is_err());
    }

    #[test]
    fn incr_creates_missing_key_at_one() {
        let engine = MemoryEngine::new(100);
        assert_eq!(engine.incr(b"new").unwrap(), 1);
        assert_eq!(engine.decr(b"other").unwrap(), -1);
    }

    #[test]
    fn type_reports_ttl_key_regardless_of_value_shape() {
        let engine = MemoryEngine::new(100);
        engine.set(b"a", b"123", None);
        assert_eq!(engine.key_type(b"a"), TypeTag::Number);
        engine.expire(b"a", 60);
        assert_eq!(engine.key_type(b"a"), TypeTag::TtlKey);
        engine.set(b"b", b"hello", None);
        assert_eq!(engine.key_type(b"b"), TypeTag::String);
        assert_eq!(engine.key_type(b"missing"), TypeTag::None);
    }

    #[test]
    fn keys_matches_glob_pattern() {
        let engine = MemoryEngine::new(100);
        engine.set(b"foo1", b"v", None);
        engine.set(b"foo2", b"v", None);
        engine.set(b"bar", b"v", None);

        let mut matched: Vec<String> = engine
            .keys("foo*")
            .into_iter()
            .map(|k| String::from_utf8(k.into_vec()).unwrap())
            .collect();
        matched.sort();
        assert_eq!(matched, vec!["foo1".to_string(), "foo2".to_string()]);
        assert_eq!(engine.key_count(), 3);
    }

    #[test]
    fn snapshot_does_not_affect_hit_miss_counters() {
        let engine = MemoryEngine::new(100);
        engine.set(b"a", b"1", None);
        engine.set(b"b", b"2", Some(0));
        std::thread::sleep(Duration::from_millis(5));

        let mut pairs: Vec<(String, String)> = engine
            .snapshot()
            .into_iter()
            .map(|(k, v)| {
                (
                    String::from_utf8(k.into_vec()).unwrap(),
                    String::from_utf8(v.to_vec()).unwrap(),
                )
            })
            .collect();
        pairs.sort();
        assert_eq!(pairs, vec![("a".to_string(), "1".to_string())]);

        let (hits, misses) = engine.stats();
        assert_eq!(hits, 0);
        assert_eq!(misses, 0);
    }

    #[test]
    fn mget_aligns_with_input_order() {
        let engine = MemoryEngine::new(100);
        engine.set(b"a", b"1", None);
        let results = engine.mget(&[b"a", b"missing"]);
        assert_eq!(results[0].as_deref(), Some(&b"1"[..]));
        assert!(results[1].is_none());
    }

    #[test]
    fn mset_sets_every_pair() {
        let engine = MemoryEngine::new(100);
        engine.mset(&[(b"a".as_slice(), b"1".as_slice()), (b"b".as_slice(), b"2".as_slice())]);
        assert_eq!(engine.get(b"a").as_deref(), Some(&b"1"[..]));
        assert_eq!(engine.get(b"b").as_deref(), Some(&b"2"[..]));
    }

    #[test]
    fn rename_moves_value_and_overwrites_destination() {
        let engine = MemoryEngine::new(100);
        engine.set(b"src", b"v1", None);
        engine.set(b"dst", b"v2", None);
        assert!(engine.rename(b"src", b"dst"));
        assert!(engine.get(b"src").is_none());
        assert_eq!(engine.get(b"dst").as_deref(), Some(&b"v1"[..]));
        assert!(!engine.rename(b"src", b"dst"));
    }

    #[test]
    fn rename_of_expired_src_reports_failure_and_untracks_key() {
        let engine = MemoryEngine::new(3);
        engine.set(b"src", b"v1", Some(1));
        engine.set(b"k2", b"v", None);
        engine.set(b"k3", b"v", None);
        std::thread::sleep(Duration::from_millis(20));

        assert!(!engine.rename(b"src", b"dst"));
        assert!(engine.get(b"dst").is_none());

        engine.set(b"k4", b"v", None);
        assert!(engine.get(b"k2").is_some());
        assert!(engine.get(b"k3").is_some());
        assert!(engine.get(b"k4").is_some());
    }

    #[test]
    fn flushall_clears_everything() {
        let engine = MemoryEngine::new(100);
        engine.set(b"a", b"1", None);
        engine.set(b"b", b"2", None);
        engine.flushall();
        assert_eq!(engine.key_count(), 0);
        assert!(engine.get(b"a").is_none());
    }

    #[test]
    fn evicts_least_recently_used_on_overflow() {
        let engine = MemoryEngine::new(3);
        engine.set(b"k1", b"v", None);
        engine.set(b"k2", b"v", None);
        engine.set(b"k3", b"v", None);
        engine.get(b"k1");
        engine.set(b"k4", b"v", None);

        assert!(engine.get(b"k2").is_none());
        assert!(engine.get(b"k1").is_some());
        assert!(engine.get(b"k3").is_some());
        assert!(engine.get(b"k4").is_some());
    }

    #[test]
    fn sweeper_thread_clears_expired_entries() {
        let engine = MemoryEngine::new(100);
        engine.set(b"a", b"v", Some(1));
        let handle = engine.start_sweeper();
        std::thread::sleep(Duration::from_millis(1100));
        handle.stop();
        assert_eq!(engine.key_count(), 0);
    }

    #[test]
    fn hits_and_misses_track_get_calls() {
        let engine = MemoryEngine::new(100);
        engine.set(b"a", b"v", None);
        engine.get(b"a");
        engine.get(b"missing");
        let (hits, misses) = engine.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
    }

    #[test]
    fn dcl_round_trip_through_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");

        {
            let engine = MemoryEngine::with_dcl(100, &path).unwrap();
            engine.set(b"a", b"1", None);
            engine.append(b"a", b"2");
            engine.set(b"b", b"x", Some(1_000_000));
            engine.del(b"a");
        }

        let engine = MemoryEngine::with_dcl(100, &path).unwrap();
        assert!(engine.get(b"a").is_none());
        assert_eq!(engine.get(b"b").as_deref(), Some(&b"x"[..]));
    }
}
