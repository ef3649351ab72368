//! Extracts `[VERB_ENTITY: key="value", ...]` action tokens from assistant
//! replies.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use super::types::{ParamMap, ParamValue, RawAction};

const LIST_KEYS: &[&str] = &[
    "topics",
    "insights",
    "decisions",
    "gaps",
    "goals",
    "actions",
    "metrics",
];

const INT_KEYS: &[&str] = &[
    "urgency",
    "frequency_days",
    "meeting_number",
    "week_number",
    "current_status",
    "target_status",
];

const FLOAT_KEYS: &[&str] = &["estimated_hours", "actual_hours", "current_hours"];

static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[((?:ADD|UPDATE|DELETE)_[A-Z0-9_]+)").unwrap());

static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// One `[KIND: body]` occurrence, as byte offsets into the reply.
struct TokenSpan<'a> {
    start: usize,
    end: usize,
    kind: &'a str,
    body: &'a str,
}

/// Tracks whether a scan position sits inside a quoted value. A quote only
/// opens at the start of a value; elsewhere (`צ'ילר`, `3"`) it is literal.
#[derive(Default)]
struct QuoteTracker {
    open: Option<char>,
    mid_value: bool,
}

impl QuoteTracker {
    /// Feed one character. Returns true when it lies outside any quoted span.
    fn feed(&mut self, ch: char) -> bool {
        if let Some(q) = self.open {
            if ch == q {
                self.open = None;
                self.mid_value = true;
            }
            return false;
        }
        match ch {
            '"' | '\'' if !self.mid_value => {
                self.open = Some(ch);
                false
            }
            '=' | ',' => {
                self.mid_value = false;
                true
            }
            c if c.is_whitespace() => true,
            _ => {
                self.mid_value = true;
                true
            }
        }
    }
}

fn scan_tokens(text: &str) -> Vec<TokenSpan<'_>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(caps) = HEAD_RE.captures_at(text, pos) {
        let (Some(head), Some(kind)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let rest = &text[head.end()..];
        let (body, consumed) = if rest.starts_with(']') {
            ("", 1)
        } else if let Some(after_colon) = rest.strip_prefix(':') {
            match body_end(after_colon) {
                Some(i) => (&after_colon[..i], i + 2),
                None => {
                    pos = head.end();
                    continue;
                }
            }
        } else {
            pos = head.end();
            continue;
        };
        let end = head.end() + consumed;
        spans.push(TokenSpan {
            start: head.start(),
            end,
            kind: kind.as_str(),
            body,
        });
        pos = end;
    }
    spans
}

/// Offset of the `]` that closes a token body. A `]` inside a quoted value
/// does not close it, unless honoring the quote would run into the next
/// token; then the first `]` wins.
fn body_end(rest: &str) -> Option<usize> {
    let first = rest.find(']')?;
    let mut quotes = QuoteTracker::default();
    for (i, ch) in rest.char_indices() {
        if quotes.feed(ch) && ch == ']' {
            if i > first && HEAD_RE.is_match(&rest[..i]) {
                return Some(first);
            }
            return Some(i);
        }
    }
    Some(first)
}

/// All action tokens in order of appearance. A token whose body cannot be
/// parsed is logged and skipped; the rest still come through.
pub fn parse_actions(text: &str) -> Vec<RawAction> {
    let mut actions = Vec::new();
    for span in scan_tokens(text) {
        match parse_params(span.body) {
            Ok(params) => actions.push(RawAction {
                kind: span.kind.to_string(),
                params,
            }),
            Err(reason) => warn!("Skipping malformed action token {}: {}", span.kind, reason),
        }
    }
    actions
}

/// Remove every action token from the visible reply.
pub fn strip_actions(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut pos = 0;
    for span in scan_tokens(text) {
        stripped.push_str(&text[pos..span.start]);
        pos = span.end;
    }
    stripped.push_str(&text[pos..]);
    let collapsed = BLANK_LINES_RE.replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}

fn parse_params(body: &str) -> Result<ParamMap, String> {
    let mut params = ParamMap::new();
    let mut current_key: Option<String> = None;

    for segment in split_outside_quotes(body)? {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match split_key_value(segment) {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() || key.chars().any(char::is_whitespace) {
                    return Err(format!("bad parameter name in '{}'", segment));
                }
                params.insert(key.to_string(), coerce(key, &unquote(value)));
                current_key = Some(key.to_string());
            }
            None => {
                // Continuation of an unquoted list value: `topics=a, b, c`.
                let Some(key) = current_key.as_deref() else {
                    return Err(format!("value without a key: '{}'", segment));
                };
                match params.get_mut(key) {
                    Some(ParamValue::List(items)) => items.push(unquote(segment)),
                    Some(ParamValue::Text(existing)) => {
                        existing.push_str(", ");
                        existing.push_str(&unquote(segment));
                    }
                    _ => return Err(format!("stray value '{}' after '{}'", segment, key)),
                }
            }
        }
    }
    Ok(params)
}

/// Split on commas that are not inside a quoted value.
fn split_outside_quotes(body: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quotes = QuoteTracker::default();
    for ch in body.chars() {
        if quotes.feed(ch) && ch == ',' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if let Some(q) = quotes.open {
        return Err(format!("unterminated {} quote", q));
    }
    parts.push(current);
    Ok(parts)
}

fn split_key_value(segment: &str) -> Option<(&str, &str)> {
    let (key, value) = segment.split_once('=')?;
    // `=` inside a quoted value is not a key separator.
    if key.contains('"') || key.contains('\'') {
        return None;
    }
    Some((key, value))
}

/// Trim, then drop one pair of matching surrounding quotes.
fn unquote(value: &str) -> String {
    let value = value.trim();
    for q in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
        {
            return inner.trim().to_string();
        }
    }
    value.to_string()
}

fn coerce(key: &str, value: &str) -> ParamValue {
    if LIST_KEYS.contains(&key) {
        let items = value
            .split(',')
            .map(unquote)
            .filter(|item| !item.is_empty())
            .collect();
        ParamValue::List(items)
    } else if INT_KEYS.contains(&key) {
        ParamValue::Int(value.trim().parse::<i64>().unwrap_or(1))
    } else if FLOAT_KEYS.contains(&key) {
        let parsed = value.trim().parse::<f64>().ok();
        ParamValue::Float(parsed.filter(|v| v.is_finite()).unwrap_or(0.0))
    } else {
        ParamValue::Text(value.to_string())
    }
}
