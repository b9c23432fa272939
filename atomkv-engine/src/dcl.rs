//! # Durable Command Log
//!
//! Text, line-oriented, append-only record of every mutating command. A
//! single writer thread owns the file; producers enqueue onto an
//! MPSC channel so the hot path never blocks on disk I/O.
//!
//! ## Durability model
//!
//! Enqueue, not fsync: a crash loses whatever sits in the channel at that
//! instant. The queue is unbounded — back-pressure is explicitly not a goal
//! here. Records are flushed in enqueue order, and callers enqueue from
//! inside the same critical section that mutates the map, so file order
//! matches linearization order per key.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

/// Appends one field to `line`, quoting it if it contains whitespace that
/// would otherwise confuse the line-based splitter.
fn push_field(line: &mut String, field: &[u8]) {
    if !line.is_empty() {
        line.push(' ');
    }
    let text = String::from_utf8_lossy(field);
    if text.is_empty() || text.contains([' ', '\n', '\r']) {
        line.push('"');
        for ch in text.chars() {
            if ch == '"' {
                line.push('\\');
            }
            line.push(ch);
        }
        line.push('"');
    } else {
        line.push_str(&text);
    }
}

fn encode(verb: &str, fields: &[&[u8]]) -> String {
    let mut line = String::from(verb);
    for field in fields {
        push_field(&mut line, field);
    }
    line
}

pub fn encode_set(key: &[u8], value: &[u8], ttl_ms: Option<u64>) -> String {
    match ttl_ms {
        Some(ms) => {
            let ms = ms.to_string();
            encode("SET", &[key, value, b"PX", ms.as_bytes()])
        }
        None => encode("SET", &[key, value]),
    }
}

pub fn encode_del(key: &[u8]) -> String {
    encode("DEL", &[key])
}

pub fn encode_persist(key: &[u8]) -> String {
    encode("PERSIST", &[key])
}

pub fn encode_expire(key: &[u8], seconds: u64) -> String {
    let seconds = seconds.to_string();
    encode("EXPIRE", &[key, seconds.as_bytes()])
}

pub fn encode_append(key: &[u8], suffix: &[u8]) -> String {
    encode("APPEND", &[key, suffix])
}

pub fn encode_incr(key: &[u8]) -> String {
    encode("INCR", &[key])
}

pub fn encode_decr(key: &[u8]) -> String {
    encode("DECR", &[key])
}

pub fn encode_rename(src: &[u8], dst: &[u8]) -> String {
    encode("RENAME", &[src, dst])
}

pub fn encode_flushall() -> String {
    "FLUSHALL".to_string()
}

pub fn encode_mset(pairs: &[(&[u8], &[u8])]) -> String {
    let mut line = String::from("MSET");
    for (k, v) in pairs {
        push_field(&mut line, k);
        push_field(&mut line, v);
    }
    line
}

/// Splits a log line into its verb and arguments, honoring double-quoted
/// fields. Quote characters delimit a field; a backslash-escaped `"` inside
/// a quoted field becomes a literal `"`.
pub fn split_fields(line: &str) -> Vec<Vec<u8>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_current = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '\\' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => current.push(other),
            }
        } else if c == '"' {
            in_quotes = true;
            has_current = true;
        } else if c.is_whitespace() {
            if has_current {
                fields.push(std::mem::take(&mut current).into_bytes());
                has_current = false;
            }
        } else {
            current.push(c);
            has_current = true;
        }
    }

    if has_current {
        fields.push(current.into_bytes());
    }

    fields
}

/// Handle to the background writer thread. Dropping it closes the channel
/// and joins the thread, flushing any queued records first.
pub struct DclHandle {
    sender: Sender<String>,
    join: Option<JoinHandle<()>>,
}

impl DclHandle {
    /// Opens (creating if needed) the log file at `path` and spawns the
    /// writer thread. The parent directory is created if missing.
    pub fn spawn(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = mpsc::channel::<String>();

        let join = std::thread::spawn(move || {
            let mut writer = BufWriter::new(file);
            while let Ok(line) = receiver.recv() {
                if let Err(err) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
                    tracing::error!(error = %err, "failed to append durable command log record");
                }
            }
            let _ = writer.flush();
        });

        Ok(DclHandle {
            sender,
            join: Some(join),
        })
    }

    /// Enqueues a record. Never blocks on disk I/O.
    pub fn enqueue(&self, line: String) {
        if self.sender.send(line).is_err() {
            tracing::error!("durable command log writer has stopped; dropping record");
        }
    }
}

impl Drop for DclHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Reads every record from `path` in order, invoking `apply` with the verb
/// and argument list for each non-blank line. Missing file is not an error
/// (fresh start). Parse errors on a line are logged and skipped.
pub fn replay(path: &Path, mut apply: impl FnMut(&str, &[Vec<u8>])) -> std::io::Result<()> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    let reader = BufReader::new(file);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(&line);
        let Some(verb_bytes) = fields.first() else {
            continue;
        };
        let Ok(verb) = std::str::from_utf8(verb_bytes) else {
            tracing::warn!(lineno, "skipping non-UTF-8 verb in durable command log");
            continue;
        };

        apply(verb, &fields[1..]);
    }

    Ok(())
}

/// Resolves the default AOF path: `~/.atomkv/appendonly.aof`.
pub fn default_path() -> PathBuf {
    let home = dirs_next_home();
    home.join(".atomkv").join("appendonly.aof")
}

fn dirs_next_home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_plain_set() {
        assert_eq!(encode_set(b"foo", b"bar", None), "SET foo bar");
    }

    #[test]
    fn encodes_set_with_ttl() {
        assert_eq!(encode_set(b"foo", b"bar", Some(500)), "SET foo bar PX 500");
    }

    #[test]
    fn quotes_fields_with_spaces() {
        let line = encode_set(b"foo", b"hello world", None);
        assert_eq!(line, "SET foo \"hello world\"");
    }

    #[test]
    fn escapes_embedded_quotes() {
        let line = encode_set(b"foo", br#"say "hi""#, None);
        assert_eq!(line, "SET foo \"say \\\"hi\\\"\"");
    }

    #[test]
    fn splits_quoted_and_plain_fields() {
        let fields = split_fields("SET foo \"hello world\"");
        assert_eq!(fields, vec![b"SET".to_vec(), b"foo".to_vec(), b"hello world".to_vec()]);
    }

    #[test]
    fn roundtrips_quoted_value_with_escaped_quote() {
        let line = encode_set(b"foo", br#"say "hi""#, None);
        let fields = split_fields(&line);
        assert_eq!(fields[2], br#"say "hi""#);
    }

    #[test]
    fn empty_field_is_preserved_via_empty_quotes() {
        let line = encode_append(b"k", b"");
        let fields = split_fields(&line);
        assert_eq!(fields[1], Vec::<u8>::new());
    }

    #[test]
    fn replay_skips_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.aof");
        std::fs::write(&path, "SET a 1\n\nDEL a\n").unwrap();

        let mut seen = Vec::new();
        replay(&path, |verb, args| {
            seen.push((verb.to_string(), args.to_vec()));
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "SET");
        assert_eq!(seen[1].0, "DEL");
    }

    #[test]
    fn replay_of_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.aof");
        replay(&path, |_, _| panic!("should not be called")).unwrap();
    }
}
