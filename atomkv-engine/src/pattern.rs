//! Glob-to-regex compilation for `KEYS`.
//!
//! `*` is the only wildcard; every other character, including regex
//! metacharacters, matches literally.

use regex::bytes::Regex;

/// Compiles a `*`-glob pattern into an anchored byte regex.
///
/// An empty pattern is treated as `*` (matches everything).
pub fn compile_glob(pattern: &str) -> Regex {
    let pattern = if pattern.is_empty() { "*" } else { pattern };

    let segments: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let body = segments.join(".*");
    let compiled = format!("^{}$", body);

    Regex::new(&compiled).unwrap_or_else(|_| Regex::new("$^").expect("static pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        let re = compile_glob("foo");
        assert!(re.is_match(b"foo"));
        assert!(!re.is_match(b"foobar"));
    }

    #[test]
    fn prefix_wildcard() {
        let re = compile_glob("foo*");
        assert!(re.is_match(b"foo1"));
        assert!(re.is_match(b"foo"));
        assert!(!re.is_match(b"bar"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let re = compile_glob("a.b");
        assert!(re.is_match(b"a.b"));
        assert!(!re.is_match(b"axb"));
    }

    #[test]
    fn empty_pattern_matches_everything() {
        let re = compile_glob("");
        assert!(re.is_match(b"anything"));
    }
}
