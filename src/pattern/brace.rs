//! Brace expansion for gitignore-style globs.
//!
//! `src/{foo,bar}/*.{js,jsx}` expands to four independent patterns before
//! compilation. Nesting and escaped braces are respected; expansion is a
//! single scan per alternation level rather than repeated string rewriting.

use crate::errors::{Error, Result};

/// Expands every brace alternation in `pattern` into the cross-product of
/// plain patterns. A pattern without braces expands to itself.
///
/// Escaped `\{` and `\}` are literal and never open or close a group.
/// Commas inside nested groups belong to the inner group.
///
/// # Errors
/// Returns [`Error::Pattern`] for unbalanced braces.
pub fn expand(pattern: &str) -> Result<Vec<String>> {
    let Some(open) = find_unescaped_open(pattern)? else {
        return Ok(vec![pattern.to_string()]);
    };

    let close = find_matching_close(pattern, open)?;
    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut out = Vec::new();
    for alt in split_top_level(body) {
        // Each alternative may itself contain nested groups; recurse on the
        // rebuilt string so the suffix's groups are expanded exactly once
        // per alternative.
        for expanded in expand(&format!("{prefix}{alt}{suffix}"))? {
            out.push(expanded);
        }
    }
    Ok(out)
}

/// Index of the first unescaped `{`, or `None`. Errors on a stray `}`.
fn find_unescaped_open(pattern: &str) -> Result<Option<usize>> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1, // skip the escaped char
            b'{' => return Ok(Some(i)),
            b'}' => {
                return Err(Error::Pattern {
                    pattern: pattern.to_string(),
                    reason: "unbalanced '}'".to_string(),
                })
            }
            _ => {}
        }
        i += 1;
    }
    Ok(None)
}

/// Index of the `}` closing the group opened at `open`.
fn find_matching_close(pattern: &str, open: usize) -> Result<usize> {
    let bytes = pattern.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(Error::Pattern {
        pattern: pattern.to_string(),
        reason: "unbalanced '{'".to_string(),
    })
}

/// Splits a group body on commas at nesting depth zero.
fn split_top_level(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_braces_passes_through() {
        assert_eq!(expand("src/*.rs").unwrap(), vec!["src/*.rs"]);
    }

    #[test]
    fn simple_alternation() {
        assert_eq!(expand("*.{js,jsx}").unwrap(), vec!["*.js", "*.jsx"]);
    }

    #[test]
    fn cross_product_of_two_groups() {
        assert_eq!(
            expand("src/{foo,bar}/*.{js,jsx}").unwrap(),
            vec![
                "src/foo/*.js",
                "src/foo/*.jsx",
                "src/bar/*.js",
                "src/bar/*.jsx"
            ]
        );
    }

    #[test]
    fn nested_groups() {
        assert_eq!(
            expand("a{b,c{d,e}}f").unwrap(),
            vec!["abf", "acdf", "acef"]
        );
    }

    #[test]
    fn nested_comma_belongs_to_inner_group() {
        assert_eq!(expand("{a,{b,c}}").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn escaped_braces_are_literal() {
        assert_eq!(expand(r"a\{b,c\}d").unwrap(), vec![r"a\{b,c\}d"]);
    }

    #[test]
    fn empty_alternative_kept() {
        assert_eq!(expand("a{,b}").unwrap(), vec!["a", "ab"]);
    }

    #[test]
    fn unbalanced_open_is_an_error() {
        assert!(expand("a{b,c").is_err());
    }

    #[test]
    fn unbalanced_close_is_an_error() {
        assert!(expand("ab}c").is_err());
    }
}
