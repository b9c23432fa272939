//! # Reduced RESP Protocol
//!
//! One command per line, whitespace-split, case-insensitive verbs. Replies
//! use a reduced RESP framing: `+str\n` simple strings, `$-1\n` nil,
//! `:int\n` integers, `-ERR msg\n` errors. Multi-value replies (`KEYS`,
//! `MGET`) are framed as an integer count followed by that many simple
//! string or nil lines.

/// A parsed client command, ready for dispatch.
pub enum Command {
    Ping(Option<Vec<u8>>),
    Get(Vec<u8>),
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        ttl_ms: Option<u64>,
    },
    Del(Vec<Vec<u8>>),
    Exists(Vec<u8>),
    Ttl(Vec<u8>),
    Persist(Vec<u8>),
    Expire {
        key: Vec<u8>,
        seconds: u64,
    },
    Append {
        key: Vec<u8>,
        suffix: Vec<u8>,
    },
    Incr(Vec<u8>),
    Decr(Vec<u8>),
    Strlen(Vec<u8>),
    Type(Vec<u8>),
    KeysPattern(String),
    KeysCount,
    Mget(Vec<Vec<u8>>),
    /// `None` marks an odd-length argument list: MSET is a silent no-op.
    Mset(Option<Vec<(Vec<u8>, Vec<u8>)>>),
    Rename {
        src: Vec<u8>,
        dst: Vec<u8>,
    },
    Flushall,
    Quit,
}

pub enum ParseError {
    Empty,
    Unknown(String),
    WrongArity(&'static str),
    InvalidInteger(&'static str),
}

/// Parses one line of input (without its trailing newline) into a command.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().ok_or(ParseError::Empty)?;
    let args: Vec<&str> = tokens.collect();

    if verb.eq_ignore_ascii_case("PING") {
        return match args.len() {
            0 => Ok(Command::Ping(None)),
            1 => Ok(Command::Ping(Some(args[0].as_bytes().to_vec()))),
            _ => Err(ParseError::WrongArity("PING")),
        };
    }
    if verb.eq_ignore_ascii_case("GET") {
        return one_key_command(&args, "GET").map(Command::Get);
    }
    if verb.eq_ignore_ascii_case("SET") {
        return parse_set(&args);
    }
    if verb.eq_ignore_ascii_case("DEL") {
        if args.is_empty() {
            return Err(ParseError::WrongArity("DEL"));
        }
        return Ok(Command::Del(args.iter().map(|a| a.as_bytes().to_vec()).collect()));
    }
    if verb.eq_ignore_ascii_case("EXISTS") {
        return one_key_command(&args, "EXISTS").map(Command::Exists);
    }
    if verb.eq_ignore_ascii_case("TTL") {
        return one_key_command(&args, "TTL").map(Command::Ttl);
    }
    if verb.eq_ignore_ascii_case("PERSIST") {
        return one_key_command(&args, "PERSIST").map(Command::Persist);
    }
    if verb.eq_ignore_ascii_case("EXPIRE") {
        if args.len() != 2 {
            return Err(ParseError::WrongArity("EXPIRE"));
        }
        let seconds: u64 = args[1].parse().map_err(|_| ParseError::InvalidInteger("EXPIRE"))?;
        return Ok(Command::Expire {
            key: args[0].as_bytes().to_vec(),
            seconds,
        });
    }
    if verb.eq_ignore_ascii_case("APPEND") {
        if args.len() != 2 {
            return Err(ParseError::WrongArity("APPEND"));
        }
        return Ok(Command::Append {
            key: args[0].as_bytes().to_vec(),
            suffix: args[1].as_bytes().to_vec(),
        });
    }
    if verb.eq_ignore_ascii_case("INCR") {
        return one_key_command(&args, "INCR").map(Command::Incr);
    }
    if verb.eq_ignore_ascii_case("DECR") {
        return one_key_command(&args, "DECR").map(Command::Decr);
    }
    if verb.eq_ignore_ascii_case("STRLEN") {
        return one_key_command(&args, "STRLEN").map(Command::Strlen);
    }
    if verb.eq_ignore_ascii_case("TYPE") {
        return one_key_command(&args, "TYPE").map(Command::Type);
    }
    if verb.eq_ignore_ascii_case("KEYS") {
        return match args.len() {
            0 => Ok(Command::KeysCount),
            1 => Ok(Command::KeysPattern(args[0].to_string())),
            _ => Err(ParseError::WrongArity("KEYS")),
        };
    }
    if verb.eq_ignore_ascii_case("MGET") {
        if args.is_empty() {
            return Err(ParseError::WrongArity("MGET"));
        }
        return Ok(Command::Mget(args.iter().map(|a| a.as_bytes().to_vec()).collect()));
    }
    if verb.eq_ignore_ascii_case("MSET") {
        if args.is_empty() || args.len() % 2 != 0 {
            return Ok(Command::Mset(None));
        }
        let pairs = args
            .chunks_exact(2)
            .map(|pair| (pair[0].as_bytes().to_vec(), pair[1].as_bytes().to_vec()))
            .collect();
        return Ok(Command::Mset(Some(pairs)));
    }
    if verb.eq_ignore_ascii_case("RENAME") {
        if args.len() != 2 {
            return Err(ParseError::WrongArity("RENAME"));
        }
        return Ok(Command::Rename {
            src: args[0].as_bytes().to_vec(),
            dst: args[1].as_bytes().to_vec(),
        });
    }
    if verb.eq_ignore_ascii_case("FLUSHALL") {
        return Ok(Command::Flushall);
    }
    if verb.eq_ignore_ascii_case("QUIT") {
        return Ok(Command::Quit);
    }

    Err(ParseError::Unknown(verb.to_string()))
}

fn one_key_command<'a>(args: &[&'a str], name: &'static str) -> Result<Vec<u8>, ParseError> {
    match args {
        [key] => Ok(key.as_bytes().to_vec()),
        _ => Err(ParseError::WrongArity(name)),
    }
}

fn parse_set(args: &[&str]) -> Result<Command, ParseError> {
    match args.len() {
        2 => Ok(Command::Set {
            key: args[0].as_bytes().to_vec(),
            value: args[1].as_bytes().to_vec(),
            ttl_ms: None,
        }),
        4 if args[2].eq_ignore_ascii_case("PX") => {
            let ttl_ms: u64 = args[3].parse().map_err(|_| ParseError::InvalidInteger("SET"))?;
            Ok(Command::Set {
                key: args[0].as_bytes().to_vec(),
                value: args[1].as_bytes().to_vec(),
                ttl_ms: Some(ttl_ms),
            })
        }
        _ => Err(ParseError::WrongArity("SET")),
    }
}

pub fn resp_simple(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 2);
    buf.push(b'+');
    buf.extend_from_slice(message.as_bytes());
    buf.push(b'\n');
    buf
}

pub fn resp_bulk(data: &[u8]) -> Vec<u8> {
    resp_simple(&String::from_utf8_lossy(data))
}

pub fn resp_error(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 6);
    buf.extend_from_slice(b"-ERR ");
    buf.extend_from_slice(message.as_bytes());
    buf.push(b'\n');
    buf
}

pub fn resp_integer(value: i64) -> Vec<u8> {
    format!(":{value}\n").into_bytes()
}

pub fn resp_nil() -> Vec<u8> {
    b"$-1\n".to_vec()
}

/// Encodes a list reply as a `:count\n` line followed by one line per item
/// (`+item\n` for present values, `$-1\n` for absent ones).
pub fn resp_list(items: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut buf = resp_integer(items.len() as i64);
    for item in items {
        match item {
            Some(bytes) => buf.extend_from_slice(&resp_bulk(bytes)),
            None => buf.extend_from_slice(&resp_nil()),
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get() {
        match parse_line("GET foo").unwrap() {
            Command::Get(key) => assert_eq!(key, b"foo"),
            _ => panic!("expected GET"),
        }
    }

    #[test]
    fn parses_set_with_px() {
        match parse_line("set foo bar PX 500").unwrap() {
            Command::Set { key, value, ttl_ms } => {
                assert_eq!(key, b"foo");
                assert_eq!(value, b"bar");
                assert_eq!(ttl_ms, Some(500));
            }
            _ => panic!("expected SET"),
        }
    }

    #[test]
    fn mset_odd_length_is_marked_as_noop() {
        match parse_line("MSET a 1 b").unwrap() {
            Command::Mset(None) => {}
            _ => panic!("expected silent no-op marker"),
        }
    }

    #[test]
    fn unknown_verb_reports_name() {
        match parse_line("FROBNICATE x") {
            Err(ParseError::Unknown(verb)) => assert_eq!(verb, "FROBNICATE"),
            _ => panic!("expected unknown verb error"),
        }
    }

    #[test]
    fn list_reply_frames_count_then_items() {
        let encoded = resp_list(&[Some(b"a".to_vec()), None]);
        assert_eq!(encoded, b":2\n+a\n$-1\n");
    }
}
