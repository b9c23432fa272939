//! # TCP Server
//!
//! Accepts line-protocol connections, parses one command per line, and
//! dispatches to the storage engine with minimal overhead. A panic inside a
//! single connection's handling does not take down the process — it is
//! caught at the task boundary and the connection is simply dropped.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use atomkv_engine::{Engine, TtlStatus};

use crate::protocol::{self, Command, ParseError};

const GREETING: &[u8] = b"OK AtomKV\n";

/// Handles a single TCP client connection until it disconnects or sends
/// `QUIT`.
pub async fn handle_connection(mut stream: TcpStream, engine: Arc<dyn Engine>) -> std::io::Result<()> {
    stream.write_all(GREETING).await?;

    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        let bytes_read = stream.read_buf(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }

        loop {
            let Some(newline) = buffer.iter().position(|&b| b == b'\n') else {
                break;
            };

            let line = buffer.split_to(newline + 1);
            let line = &line[..line.len() - 1];
            let line = String::from_utf8_lossy(line);
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                continue;
            }

            let response = dispatch_line(line, engine.as_ref());
            stream.write_all(&response).await?;

            if line.eq_ignore_ascii_case("QUIT") {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn dispatch_line(line: &str, engine: &dyn Engine) -> Vec<u8> {
    match protocol::parse_line(line) {
        Ok(command) => dispatch_command(command, engine),
        Err(ParseError::Empty) => protocol::resp_error("empty command"),
        Err(ParseError::Unknown(verb)) => protocol::resp_error(&format!("unknown command '{verb}'")),
        Err(ParseError::WrongArity(name)) => {
            protocol::resp_error(&format!("wrong number of arguments for {name}"))
        }
        Err(ParseError::InvalidInteger(name)) => {
            protocol::resp_error(&format!("invalid integer argument for {name}"))
        }
    }
}

fn dispatch_command(command: Command, engine: &dyn Engine) -> Vec<u8> {
    match command {
        Command::Ping(None) => protocol::resp_simple("PONG"),
        Command::Ping(Some(payload)) => protocol::resp_bulk(&payload),
        Command::Get(key) => match engine.get(&key) {
            Some(value) => protocol::resp_bulk(&value),
            None => protocol::resp_nil(),
        },
        Command::Set { key, value, ttl_ms } => {
            engine.set(&key, &value, ttl_ms);
            protocol::resp_simple("OK")
        }
        Command::Del(keys) => {
            let removed = keys.iter().filter(|key| engine.del(key)).count();
            protocol::resp_integer(removed as i64)
        }
        Command::Exists(key) => protocol::resp_integer(engine.exists(&key) as i64),
        Command::Ttl(key) => match engine.ttl(&key) {
            TtlStatus::Missing => protocol::resp_integer(-2),
            TtlStatus::NoExpiry => protocol::resp_integer(-1),
            TtlStatus::ExpiresIn(ms) => protocol::resp_integer(ms),
        },
        Command::Persist(key) => protocol::resp_integer(engine.persist(&key) as i64),
        Command::Expire { key, seconds } => protocol::resp_integer(engine.expire(&key, seconds) as i64),
        Command::Append { key, suffix } => protocol::resp_integer(engine.append(&key, &suffix) as i64),
        Command::Incr(key) => match engine.incr(&key) {
            Ok(value) => protocol::resp_integer(value),
            Err(_) => protocol::resp_error("value is not an integer"),
        },
        Command::Decr(key) => match engine.decr(&key) {
            Ok(value) => protocol::resp_integer(value),
            Err(_) => protocol::resp_error("value is not an integer"),
        },
        Command::Strlen(key) => protocol::resp_integer(engine.strlen(&key) as i64),
        Command::Type(key) => protocol::resp_simple(engine.key_type(&key).as_str()),
        Command::KeysPattern(pattern) => {
            let keys = engine.keys(&pattern);
            let items: Vec<Option<Vec<u8>>> = keys.into_iter().map(|k| Some(k.into_vec())).collect();
            protocol::resp_list(&items)
        }
        Command::KeysCount => protocol::resp_integer(engine.key_count() as i64),
        Command::Mget(keys) => {
            let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
            let values = engine.mget(&refs);
            let items: Vec<Option<Vec<u8>>> = values.into_iter().map(|v| v.map(|v| v.to_vec())).collect();
            protocol::resp_list(&items)
        }
        Command::Mset(None) => protocol::resp_simple("OK"),
        Command::Mset(Some(pairs)) => {
            let refs: Vec<(&[u8], &[u8])> = pairs.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();
            engine.mset(&refs);
            protocol::resp_simple("OK")
        }
        Command::Rename { src, dst } => {
            if engine.rename(&src, &dst) {
                protocol::resp_simple("OK")
            } else {
                protocol::resp_error("no such key")
            }
        }
        Command::Flushall => {
            engine.flushall();
            protocol::resp_simple("OK")
        }
        Command::Quit => protocol::resp_simple("BYE"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomkv_engine::MemoryEngine;

    fn engine() -> Arc<dyn Engine> {
        MemoryEngine::new(100)
    }

    #[test]
    fn dispatches_set_then_get() {
        let engine = engine();
        assert_eq!(dispatch_line("SET foo bar", engine.as_ref()), b"+OK\n");
        assert_eq!(dispatch_line("GET foo", engine.as_ref()), b"+bar\n");
    }

    #[test]
    fn dispatches_del_and_reports_missing_get() {
        let engine = engine();
        dispatch_line("SET foo bar", engine.as_ref());
        assert_eq!(dispatch_line("DEL foo", engine.as_ref()), b":1\n");
        assert_eq!(dispatch_line("GET foo", engine.as_ref()), b"$-1\n");
    }

    #[test]
    fn incr_reports_not_an_integer_error() {
        let engine = engine();
        dispatch_line("SET n abc", engine.as_ref());
        let response = dispatch_line("INCR n", engine.as_ref());
        assert!(response.starts_with(b"-ERR"));
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let engine = engine();
        let response = dispatch_line("FROBNICATE", engine.as_ref());
        assert!(response.starts_with(b"-ERR"));
    }
}
