//! Minimal iCalendar reader producing import candidates.
//!
//! # Responsibility
//! - Unfold content lines and walk `VEVENT` components.
//! - Map the properties the importer understands onto [`Candidate`] fields.
//!
//! # Invariants
//! - Nested components (`VALARM`, ...) never leak properties into their event.
//! - `DTSTART`/`DTEND` are split into raw date and time components; no time
//!   zone conversion happens here. A `TZID` parameter is recorded on the
//!   candidate as-is.

use super::Candidate;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcsError {
    /// Body does not contain a `VCALENDAR` component.
    NotCalendar,
    Malformed { line: usize, message: String },
}

impl Display for IcsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCalendar => write!(f, "content is not an iCalendar document"),
            Self::Malformed { line, message } => {
                write!(f, "malformed iCalendar at line {line}: {message}")
            }
        }
    }
}

impl Error for IcsError {}

/// Parses every `VEVENT` of an iCalendar document, in document order.
pub fn parse_calendar(text: &str) -> Result<Vec<Candidate>, IcsError> {
    let lines = unfold_lines(text);
    if !lines
        .iter()
        .any(|(_, line)| line.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(IcsError::NotCalendar);
    }

    let mut candidates = Vec::new();
    let mut current: Option<Candidate> = None;
    let mut nested_depth = 0usize;

    for (line_no, line) in &lines {
        let Some(Property { name, tzid, value }) = split_property(line) else {
            continue;
        };

        match (name.as_str(), current.is_some()) {
            ("BEGIN", false) if value.eq_ignore_ascii_case("VEVENT") => {
                current = Some(Candidate::default());
            }
            ("BEGIN", true) => {
                if value.eq_ignore_ascii_case("VEVENT") {
                    return Err(IcsError::Malformed {
                        line: *line_no,
                        message: "VEVENT opened inside another VEVENT".to_string(),
                    });
                }
                nested_depth += 1;
            }
            ("END", true) if nested_depth > 0 => nested_depth -= 1,
            ("END", true) if value.eq_ignore_ascii_case("VEVENT") => {
                if let Some(candidate) = current.take() {
                    candidates.push(candidate);
                }
            }
            ("END", false) if value.eq_ignore_ascii_case("VEVENT") => {
                return Err(IcsError::Malformed {
                    line: *line_no,
                    message: "END:VEVENT without BEGIN:VEVENT".to_string(),
                });
            }
            (_, true) if nested_depth == 0 => {
                if let Some(candidate) = current.as_mut() {
                    apply_property(candidate, &name, &value);
                    if matches!(name.as_str(), "DTSTART" | "DTEND") && tzid.is_some() {
                        candidate.time_zone = tzid;
                    }
                }
            }
            _ => {}
        }
    }

    if current.is_some() {
        return Err(IcsError::Malformed {
            line: lines.len(),
            message: "unterminated VEVENT".to_string(),
        });
    }

    Ok(candidates)
}

fn apply_property(candidate: &mut Candidate, name: &str, value: &str) {
    match name {
        "SUMMARY" => candidate.title = unescape_text(value),
        "DESCRIPTION" => candidate.description = non_empty(unescape_text(value)),
        "URL" => candidate.url = non_empty(value.trim().to_string()),
        "LOCATION" => candidate.venue_name = non_empty(unescape_text(value)),
        "CATEGORIES" => candidate.tags.extend(
            split_unescaped_commas(value)
                .into_iter()
                .map(|tag| unescape_text(&tag)),
        ),
        "DTSTART" => {
            let (date, time) = split_date_time(value);
            candidate.start_date = Some(date);
            candidate.start_time = time;
        }
        "DTEND" => {
            let (date, time) = split_date_time(value);
            candidate.end_date = Some(date);
            candidate.end_time = time;
        }
        _ => {}
    }
}

/// Joins folded continuation lines (RFC 5545 §3.1) and drops blank lines.
/// Returned line numbers are 1-based positions of each logical line.
fn unfold_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let raw = raw.trim_end_matches('\r');
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !raw.trim().is_empty() {
            lines.push((index + 1, raw.to_string()));
        }
    }
    lines
}

/// One content line split into its parts.
struct Property {
    /// Uppercased property name.
    name: String,
    /// Value of a `TZID` parameter, quotes removed.
    tzid: Option<String>,
    value: String,
}

/// Splits `NAME;PARAM=x:value` into name, `TZID` parameter and raw value.
fn split_property(line: &str) -> Option<Property> {
    let mut in_quotes = false;
    let mut colon_at = None;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                colon_at = Some(index);
                break;
            }
            _ => {}
        }
    }

    let colon_at = colon_at?;
    let mut head = line[..colon_at].split(';');
    let name = head.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let tzid = head.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("TZID") {
            return None;
        }
        non_empty(value.trim().trim_matches('"').to_string())
    });

    Some(Property {
        name: name.to_ascii_uppercase(),
        tzid,
        value: line[colon_at + 1..].to_string(),
    })
}

fn split_date_time(value: &str) -> (String, Option<String>) {
    let value = value.trim();
    match value.split_once(['T', 't']) {
        Some((date, time)) => (date.to_string(), non_empty(time.to_string())),
        None => (value.to_string(), None),
    }
}

fn split_unescaped_commas(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in value.chars() {
        if escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
