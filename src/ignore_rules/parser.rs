//! Line-by-line parsing of ignore files.

use super::{IgnoreRule, RuleKind, RuleSet};
use crate::pattern::{brace, Matcher};
use log::warn;

/// Parses the content of one ignore file into a [`RuleSet`].
///
/// Blank lines and `#` comments are skipped. A `!` prefix marks a
/// re-include, a trailing `/` restricts the rule to directories, and a
/// leading `/` anchors it to the file's directory. Brace groups are
/// expanded here, one rule per expansion. Malformed globs degrade to
/// literal matchers so no line of input is lost.
pub fn parse_rule_set(
    content: &str,
    base_dir: &str,
    kind: RuleKind,
    case_insensitive: bool,
) -> RuleSet {
    let mut rules = Vec::new();
    for raw_line in content.lines() {
        let Some(parsed) = parse_line(raw_line) else {
            continue;
        };
        let expansions = match brace::expand(&parsed.pattern) {
            Ok(expansions) => expansions,
            Err(e) => {
                warn!("{e}; treating pattern as literal");
                vec![parsed.pattern.clone()]
            }
        };
        for expansion in expansions {
            if expansion.is_empty() {
                continue;
            }
            let matcher = Matcher::new(&expansion, case_insensitive)
                .unwrap_or_else(|e| {
                    warn!("{e}; treating pattern as literal");
                    Matcher::literal(&expansion, case_insensitive)
                });
            rules.push(IgnoreRule {
                contains_slash: expansion.contains('/'),
                pattern: expansion,
                negation: parsed.negation,
                directory_only: parsed.directory_only,
                leading_slash: parsed.leading_slash,
                matcher,
            });
        }
    }
    RuleSet {
        base_dir: base_dir.to_string(),
        kind,
        rules,
    }
}

struct ParsedLine {
    pattern: String,
    negation: bool,
    directory_only: bool,
    leading_slash: bool,
}

/// Normalizes one raw line into its flags and stripped pattern, or `None`
/// for blanks and comments.
fn parse_line(raw: &str) -> Option<ParsedLine> {
    let line = trim_unescaped(raw);
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (negation, line) = match line.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    // An escaped leading `!` or `#` is a literal; the matcher unescapes it.
    let (directory_only, line) = match line.strip_suffix('/') {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    let (leading_slash, line) = match line.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    if line.is_empty() {
        return None;
    }
    Some(ParsedLine {
        pattern: line.to_string(),
        negation,
        directory_only,
        leading_slash,
    })
}

/// Trims leading whitespace and unescaped trailing spaces; a `\ ` at the
/// end survives as an escaped space for the matcher.
fn trim_unescaped(raw: &str) -> &str {
    let mut line = raw.trim_start();
    loop {
        let Some(stripped) = line.strip_suffix(' ') else {
            break;
        };
        if stripped.ends_with('\\') {
            break;
        }
        line = stripped;
    }
    line.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> RuleSet {
        parse_rule_set(content, "", RuleKind::Gitignore, false)
    }

    #[test]
    fn blank_and_comment_lines_skipped() {
        let set = parse("\n# comment\n   \n*.log\n");
        assert_eq!(set.rules.len(), 1);
        assert_eq!(set.rules[0].pattern, "*.log");
    }

    #[test]
    fn negation_flag() {
        let set = parse("!important.log\n");
        assert!(set.rules[0].negation);
        assert_eq!(set.rules[0].pattern, "important.log");
    }

    #[test]
    fn directory_only_flag_strips_slash() {
        let set = parse("build/\n");
        assert!(set.rules[0].directory_only);
        assert_eq!(set.rules[0].pattern, "build");
        assert!(!set.rules[0].contains_slash);
    }

    #[test]
    fn leading_slash_anchors() {
        let set = parse("/dist\n");
        assert!(set.rules[0].leading_slash);
        assert_eq!(set.rules[0].pattern, "dist");
    }

    #[test]
    fn brace_expansion_emits_one_rule_per_expansion() {
        let set = parse("*.{js,jsx}\n");
        assert_eq!(set.rules.len(), 2);
        assert_eq!(set.rules[0].pattern, "*.js");
        assert_eq!(set.rules[1].pattern, "*.jsx");
        assert!(!set.rules[0].negation);
    }

    #[test]
    fn flags_shared_across_expansions() {
        let set = parse("!{a,b}/\n");
        assert_eq!(set.rules.len(), 2);
        for rule in &set.rules {
            assert!(rule.negation);
            assert!(rule.directory_only);
        }
    }

    #[test]
    fn unbalanced_brace_degrades_to_literal() {
        let set = parse("src/{oops\n");
        assert_eq!(set.rules.len(), 1);
        let rule = &set.rules[0];
        assert!(rule.matches("src/{oops", "{oops"));
        assert!(!rule.matches("src/x", "x"));
    }

    #[test]
    fn trailing_space_trimmed_unless_escaped() {
        let set = parse("foo   \nbar\\ \n");
        assert_eq!(set.rules[0].pattern, "foo");
        assert_eq!(set.rules[1].pattern, "bar\\ ");
        assert!(set.rules[1].matches("bar ", "bar "));
    }

    #[test]
    fn bare_slash_line_is_dropped() {
        let set = parse("/\n!/\n");
        assert!(set.rules.is_empty());
    }

    #[test]
    fn basename_vs_path_subject() {
        let set = parse("*.log\ndocs/*.md\n");
        // Unanchored, no slash: matches by basename at any depth.
        assert!(set.rules[0].matches("deep/nested/x.log", "x.log"));
        // Path-shaped: matches by relative path.
        assert!(set.rules[1].matches("docs/readme.md", "readme.md"));
        assert!(!set.rules[1].matches("other/docs/readme.md", "readme.md"));
    }
}
