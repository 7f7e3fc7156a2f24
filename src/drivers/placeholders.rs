//! Rewrites `?` and `:name` placeholders into PostgreSQL's `$N` form.

use std::borrow::Cow;

use crate::error::DriverError;

/// Result of rewriting a query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rewritten<'a> {
    pub sql: Cow<'a, str>,
    /// Parameter names in `$N` order; empty when the query is positional.
    pub names: Vec<String>,
}

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Translate `?` to `$1, $2, ...` in order, and each distinct `:name` to the
/// `$N` of its first appearance. Quoted text, comments, dollar-quoted bodies
/// and `::` casts are left alone.
pub(crate) fn rewrite_placeholders(sql: &str) -> Result<Rewritten<'_>, DriverError> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut names: Vec<String> = Vec::new();
    let mut positional = 0usize;
    let mut state = State::Normal;
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, end)) = dollar_quote_tag(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = end;
                    }
                }
                b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1,
                b':' if starts_identifier(bytes.get(idx + 1)) => {
                    let end = scan_identifier(bytes, idx + 1);
                    if positional > 0 {
                        return Err(DriverError::MixedPlaceholders);
                    }
                    let name = &sql[idx + 1..end];
                    let number = match names.iter().position(|n| n == name) {
                        Some(pos) => pos + 1,
                        None => {
                            names.push(name.to_string());
                            names.len()
                        }
                    };
                    let buf = out.get_or_insert_with(String::new);
                    buf.push_str(&sql[copied..idx]);
                    buf.push('$');
                    buf.push_str(&number.to_string());
                    copied = end;
                    idx = end;
                    continue;
                }
                b'?' => {
                    if !names.is_empty() {
                        return Err(DriverError::MixedPlaceholders);
                    }
                    positional += 1;
                    let buf = out.get_or_insert_with(String::new);
                    buf.push_str(&sql[copied..idx]);
                    buf.push('$');
                    buf.push_str(&positional.to_string());
                    copied = idx + 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && closes_dollar_quote(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    Ok(Rewritten { sql, names })
}

fn starts_identifier(b: Option<&u8>) -> bool {
    matches!(b, Some(b) if b.is_ascii_alphabetic() || *b == b'_')
}

fn scan_identifier(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    idx
}

/// Returns the tag and the index of the closing `$` of an opening `$tag$`.
fn dollar_quote_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') || (b.is_ascii_digit() && idx == start + 1) {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len() && &bytes[idx + 1..end] == tag.as_bytes() && bytes[end] == b'$'
}
