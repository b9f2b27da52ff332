//! Lexical SQL statement classification.
//!
//! The gateway never parses SQL into an AST. Classification is a pure
//! function of the token stream: comments and string literals are stripped,
//! the text is split on top-level semicolons, and each fragment is judged by
//! its leading keyword. Anything the scanner cannot place lands in
//! [`StatementClass::Unknown`], and the policy layer decides what to do with
//! that. The bias is always toward the more restrictive class.

use serde::{Deserialize, Serialize};

/// Coarse risk class of a SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementClass {
    /// SELECT, WITH, SHOW, DESCRIBE, EXPLAIN, ANALYZE
    Read,
    /// INSERT, UPDATE, MERGE, REPLACE
    Write,
    /// DELETE, DROP, TRUNCATE, ALTER, CREATE, GRANT, REVOKE
    Destructive,
    /// Anything the scanner cannot place, including empty input
    Unknown,
}

impl StatementClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Destructive => "destructive",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StatementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const READ_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "ANALYZE",
];
const WRITE_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "MERGE", "REPLACE"];
const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "GRANT", "REVOKE",
];

fn is_destructive_keyword(word: &str) -> bool {
    DESTRUCTIVE_KEYWORDS.contains(&word)
}

/// One top-level statement after comment stripping.
struct Fragment {
    /// Uppercased word tokens, in order. Quoted strings and identifiers
    /// contribute no tokens.
    tokens: Vec<String>,
    /// True when the fragment contained anything beyond whitespace and
    /// comments, even if no word token was produced.
    has_content: bool,
}

impl Fragment {
    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            has_content: false,
        }
    }

    fn is_empty(&self) -> bool {
        !self.has_content
    }
}

/// Split raw SQL into top-level fragments of word tokens.
///
/// Handles `--` and `#` line comments, `/* */` block comments, single-quoted
/// literals with `''` escapes, double-quoted and backtick-quoted
/// identifiers. Semicolons inside any quoted region do not split.
fn scan(sql: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut current = Fragment::new();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            // MySQL-style line comment
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '\'' => {
                current.has_content = true;
                while let Some(c) = chars.next() {
                    if c == '\'' {
                        // '' is an escaped quote inside the literal
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '"' => {
                current.has_content = true;
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '`' => {
                current.has_content = true;
                for c in chars.by_ref() {
                    if c == '`' {
                        break;
                    }
                }
            }
            ';' => {
                let done = std::mem::replace(&mut current, Fragment::new());
                if !done.is_empty() {
                    fragments.push(done);
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                current.has_content = true;
                let mut word = String::new();
                word.extend(c.to_uppercase());
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        word.extend(next.to_uppercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                current.tokens.push(word);
            }
            _ => {
                // digits, operators, parens: content but not a word token
                current.has_content = true;
            }
        }
    }

    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}

/// Classify a raw SQL string.
///
/// Deterministic and side-effect free. Multi-statement input is `Unknown`
/// unless any fragment carries a destructive keyword, in which case the
/// whole input is `Destructive`. A destructive keyword anywhere in a single
/// statement also forces `Destructive` (`EXPLAIN DELETE ...` is treated as
/// destructive, a deliberate over-approximation), and a write keyword
/// anywhere in a read-leading statement forces `Write`: data-modifying CTEs
/// like `WITH cte AS (...) INSERT INTO t ...` must not pass as reads.
pub fn classify(sql: &str) -> StatementClass {
    let fragments = scan(sql);
    if fragments.is_empty() {
        return StatementClass::Unknown;
    }

    let destructive_anywhere = fragments
        .iter()
        .any(|f| f.tokens.iter().any(|t| is_destructive_keyword(t)));
    if destructive_anywhere {
        return StatementClass::Destructive;
    }

    if fragments.len() > 1 {
        return StatementClass::Unknown;
    }

    let tokens = &fragments[0].tokens;
    match tokens.first().map(String::as_str) {
        Some(first) if READ_KEYWORDS.contains(&first) => {
            if tokens.iter().any(|t| WRITE_KEYWORDS.contains(&t.as_str())) {
                StatementClass::Write
            } else {
                StatementClass::Read
            }
        }
        Some(first) if WRITE_KEYWORDS.contains(&first) => StatementClass::Write,
        _ => StatementClass::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_read() {
        assert_eq!(classify("SELECT * FROM users"), StatementClass::Read);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("sElEcT 1"), StatementClass::Read);
        assert_eq!(classify("insert into t values (1)"), StatementClass::Write);
        assert_eq!(classify("dRoP TABLE t"), StatementClass::Destructive);
    }

    #[test]
    fn test_leading_comments_ignored() {
        assert_eq!(
            classify("-- just fetching\nSELECT 1"),
            StatementClass::Read
        );
        assert_eq!(
            classify("/* multi\nline */ SELECT id FROM t"),
            StatementClass::Read
        );
        assert_eq!(
            classify("  /* a */ -- b\n  WITH cte AS (SELECT 1) SELECT * FROM cte"),
            StatementClass::Read
        );
    }

    #[test]
    fn test_read_keyword_variants() {
        assert_eq!(classify("SHOW TABLES"), StatementClass::Read);
        assert_eq!(classify("DESCRIBE users"), StatementClass::Read);
        assert_eq!(classify("EXPLAIN SELECT 1"), StatementClass::Read);
    }

    #[test]
    fn test_write_keywords() {
        assert_eq!(
            classify("UPDATE t SET a = 1 WHERE id = 2"),
            StatementClass::Write
        );
        assert_eq!(
            classify("MERGE INTO t USING s ON t.id = s.id"),
            StatementClass::Write
        );
    }

    #[test]
    fn test_destructive_keywords() {
        for sql in [
            "DELETE FROM t",
            "DROP TABLE t",
            "TRUNCATE TABLE t",
            "ALTER TABLE t ADD COLUMN c INT",
            "CREATE TABLE t (id INT)",
            "GRANT SELECT ON t TO u",
            "REVOKE SELECT ON t FROM u",
        ] {
            assert_eq!(classify(sql), StatementClass::Destructive, "{}", sql);
        }
    }

    #[test]
    fn test_empty_and_comment_only_is_unknown() {
        assert_eq!(classify(""), StatementClass::Unknown);
        assert_eq!(classify("   \n\t "), StatementClass::Unknown);
        assert_eq!(classify("-- nothing here"), StatementClass::Unknown);
        assert_eq!(classify("/* still nothing */"), StatementClass::Unknown);
    }

    #[test]
    fn test_unrecognized_leading_keyword_is_unknown() {
        assert_eq!(classify("VACUUM"), StatementClass::Unknown);
        assert_eq!(classify("CALL do_things()"), StatementClass::Unknown);
        assert_eq!(classify("???"), StatementClass::Unknown);
    }

    #[test]
    fn test_multi_statement_without_destructive_is_unknown() {
        assert_eq!(classify("SELECT 1; SELECT 2"), StatementClass::Unknown);
        assert_eq!(
            classify("SELECT 1; INSERT INTO t VALUES (1)"),
            StatementClass::Unknown
        );
    }

    #[test]
    fn test_multi_statement_with_destructive_is_destructive() {
        assert_eq!(
            classify("SELECT 1; DROP TABLE users"),
            StatementClass::Destructive
        );
        assert_eq!(
            classify("INSERT INTO t VALUES (1); DELETE FROM t"),
            StatementClass::Destructive
        );
    }

    #[test]
    fn test_trailing_semicolon_is_single_statement() {
        assert_eq!(classify("SELECT 1;"), StatementClass::Read);
        assert_eq!(classify("SELECT 1; -- done"), StatementClass::Read);
    }

    #[test]
    fn test_destructive_keyword_embedded_forces_destructive() {
        assert_eq!(
            classify("EXPLAIN DELETE FROM t"),
            StatementClass::Destructive
        );
        assert_eq!(
            classify("SELECT drop FROM maneuvers"),
            StatementClass::Destructive
        );
    }

    #[test]
    fn test_data_modifying_cte_is_write() {
        assert_eq!(
            classify("WITH cte AS (SELECT 1) INSERT INTO t SELECT x FROM cte"),
            StatementClass::Write
        );
        assert_eq!(
            classify("WITH moved AS (SELECT id FROM src) UPDATE t SET done = 1"),
            StatementClass::Write
        );
        // A plain CTE read stays a read
        assert_eq!(
            classify("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            StatementClass::Read
        );
    }

    #[test]
    fn test_explain_of_write_is_write() {
        assert_eq!(
            classify("EXPLAIN INSERT INTO t VALUES (1)"),
            StatementClass::Write
        );
    }

    #[test]
    fn test_hash_line_comments_ignored() {
        assert_eq!(classify("# note\nSELECT 1"), StatementClass::Read);
        assert_eq!(classify("# only a comment"), StatementClass::Unknown);
        assert_eq!(
            classify("SELECT 1 # trailing DROP mention\nFROM t"),
            StatementClass::Read
        );
    }

    #[test]
    fn test_keywords_inside_string_literals_do_not_count() {
        assert_eq!(
            classify("SELECT * FROM log WHERE action = 'DROP TABLE users'"),
            StatementClass::Read
        );
        assert_eq!(
            classify("SELECT 'it''s a DELETE; really' FROM t"),
            StatementClass::Read
        );
    }

    #[test]
    fn test_keywords_inside_quoted_identifiers_do_not_count() {
        assert_eq!(
            classify("SELECT \"delete\" FROM t"),
            StatementClass::Read
        );
        assert_eq!(classify("SELECT `drop` FROM t"), StatementClass::Read);
    }

    #[test]
    fn test_semicolon_inside_literal_does_not_split() {
        assert_eq!(
            classify("SELECT * FROM t WHERE note = 'a;b'"),
            StatementClass::Read
        );
    }

    #[test]
    fn test_identifier_prefix_is_not_a_keyword_match() {
        // created_at contains "create" but is a single token
        assert_eq!(
            classify("SELECT created_at FROM t ORDER BY created_at"),
            StatementClass::Read
        );
        assert_eq!(
            classify("SELECT * FROM grants_summary"),
            StatementClass::Read
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let sql = "SELECT * FROM t; DROP TABLE t";
        let first = classify(sql);
        for _ in 0..10 {
            assert_eq!(classify(sql), first);
        }
    }
}
