//! Placeholder translation between the crate's canonical `?N` parameter
//! syntax and each backend's native style.
//!
//! Repository SQL is written once with numbered `?1..?N` placeholders; the
//! executor rewrites them per backend before handing the text to the driver.
//! A lightweight scanner skips string literals, quoted/bracketed identifiers,
//! and comments so placeholder-looking text inside them is left alone.

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::error::RepositoryError;
use crate::types::Backend;

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// SQLite-style `?N`, identical to the canonical form; no rewrite.
    Canonical,
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQL Server-style placeholders like `@P1`.
    Mssql,
}

impl Backend {
    /// The placeholder style the backend's driver expects.
    #[must_use]
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "mssql")]
            Backend::Mssql => PlaceholderStyle::Mssql,
            #[cfg(feature = "postgres")]
            Backend::Postgres => PlaceholderStyle::Postgres,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => PlaceholderStyle::Canonical,
        }
    }
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Bracketed,
    LineComment,
    BlockComment(u32),
}

fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// A `?N` placeholder found outside literals and comments. `start` points at
/// the `?`, `end` is one past the last digit, and `number` is `None` only
/// when the digits overflow `u32`.
struct Placeholder {
    start: usize,
    end: usize,
    number: Option<u32>,
}

fn scan_placeholders(sql: &str) -> Vec<Placeholder> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' => state = State::Bracketed,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => state = State::BlockComment(1),
                b'?' => {
                    if let Some((digits_end, digits)) = scan_digits(bytes, idx + 1) {
                        found.push(Placeholder {
                            start: idx,
                            end: digits_end,
                            number: digits.parse().ok(),
                        });
                        idx = digits_end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                } else if is_block_comment_end(bytes, idx) {
                    if depth == 1 {
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
        }

        idx += 1;
    }

    found
}

/// Translate canonical `?N` placeholders to the target style.
///
/// Returns a borrowed `Cow` when no rewrite is needed. Bare `?` (without a
/// number) is never touched, so JSON operators and the like survive.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let prefix: &str = match target {
        PlaceholderStyle::Canonical => return Cow::Borrowed(sql),
        PlaceholderStyle::Postgres => "$",
        PlaceholderStyle::Mssql => "@P",
    };

    let spans = scan_placeholders(sql);
    if spans.is_empty() {
        return Cow::Borrowed(sql);
    }

    let bytes = sql.as_bytes();
    let mut buf = Vec::with_capacity(sql.len() + spans.len() * prefix.len());
    let mut last = 0;
    for span in &spans {
        buf.extend_from_slice(&bytes[last..span.start]);
        buf.extend_from_slice(prefix.as_bytes());
        // the digits immediately follow the `?`
        buf.extend_from_slice(&bytes[span.start + 1..span.end]);
        last = span.end;
    }
    buf.extend_from_slice(&bytes[last..]);

    // Only ASCII was spliced into otherwise-intact UTF-8 input.
    Cow::Owned(String::from_utf8_lossy(&buf).into_owned())
}

/// Check that the distinct placeholder numbers in `sql` form an unbroken
/// `?1..?N` run. Tiberius binds `@P1..@PN` positionally, so a gap or a
/// zero-numbered placeholder would silently shift every later argument.
///
/// # Errors
///
/// Returns [`RepositoryError::InvalidSpec`] when a placeholder is `?0`,
/// out of `u32` range, or leaves a gap in the sequence.
pub fn validate_sequential_placeholders(sql: &str) -> Result<(), RepositoryError> {
    let mut seen = BTreeSet::new();
    for span in scan_placeholders(sql) {
        let text = &sql[span.start..span.end];
        let number = span.number.ok_or_else(|| {
            RepositoryError::InvalidSpec(format!("placeholder {text} is out of range"))
        })?;
        if number == 0 {
            return Err(RepositoryError::InvalidSpec(
                "placeholder numbering starts at ?1".to_string(),
            ));
        }
        seen.insert(number);
    }

    let mut expected = 1;
    for number in seen {
        if number != expected {
            return Err(RepositoryError::InvalidSpec(format!(
                "placeholders must be numbered sequentially; found ?{number} but ?{expected} is missing"
            )));
        }
        expected += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_to_postgres() {
        let sql = "select * from t where a = ?1 and b = ?2";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn translates_to_mssql() {
        let sql = "insert into t values(?1, ?2)";
        let res = translate_placeholders(sql, PlaceholderStyle::Mssql);
        assert_eq!(res, "insert into t values(@P1, @P2)");
    }

    #[test]
    fn canonical_target_is_a_no_op() {
        let sql = "select * from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Canonical);
        assert!(matches!(res, Cow::Borrowed(_)));
        assert_eq!(res, sql);
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?1', ?1 -- ?2\n/* ?3 */ from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, "select '?1', $1 -- ?2\n/* ?3 */ from t where a = $1");
    }

    #[test]
    fn skips_bracketed_identifiers() {
        let sql = "select [odd?1name] from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Mssql);
        assert_eq!(res, "select [odd?1name] from t where a = @P1");
    }

    #[test]
    fn bare_question_mark_is_untouched() {
        let sql = "select meta ? 'key' from t";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres);
        assert_eq!(res, sql);
    }

    #[test]
    fn sequential_placeholders_pass_validation() {
        assert!(validate_sequential_placeholders("select 1").is_ok());
        assert!(validate_sequential_placeholders("where a = ?1 and b = ?2").is_ok());
        // repeats are fine as long as no number is skipped
        assert!(validate_sequential_placeholders("where a = ?2 or a = ?1 or b = ?2").is_ok());
    }

    #[test]
    fn gapped_placeholders_fail_validation() {
        let err = validate_sequential_placeholders("where a = ?1 and b = ?3").unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidSpec(_)));
        assert!(err.to_string().contains("?2"));

        let zero = validate_sequential_placeholders("where a = ?0").unwrap_err();
        assert!(matches!(zero, RepositoryError::InvalidSpec(_)));
    }

    #[test]
    fn validation_ignores_literals_and_comments() {
        assert!(validate_sequential_placeholders("select '?5', ?1 -- ?9").is_ok());
    }
}
