//! Date and amount parsing for bank statement cells

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// Tries a list of strftime formats in order
#[derive(Debug, Clone, PartialEq)]
pub struct DateParser {
    formats: Vec<String>,
}

impl DateParser {
    /// `preferred` (a bank-specific format) is tried before `fallbacks`
    pub fn new(preferred: Option<&str>, fallbacks: &[String]) -> Self {
        let mut formats: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
        if let Some(format) = preferred {
            formats.push(format.to_string());
        }
        for format in fallbacks {
            if !formats.contains(format) {
                formats.push(format.clone());
            }
        }
        Self { formats }
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Parse a date cell, ignoring any time-of-day part
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim().trim_matches('"').trim();
        if s.is_empty() {
            return None;
        }

        for format in &self.formats {
            if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                // %Y takes 1-4 digits; leave two-digit years to %y
                if format.contains("%Y") && date.year() < 1000 {
                    continue;
                }
                return Some(date);
            }
        }

        // "2025-06-30T00:00:00" and "2025-06-30 09:15:00"
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Some(dt.date());
            }
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }

        None
    }
}

/// Parse a money cell into a signed decimal.
///
/// Accepts currency symbols, thousands separators, a leading `+`/`-`, a
/// trailing `-`, parentheses for negatives, and `CR`/`DR` suffixes.
/// Returns `None` for anything else, including an empty cell.
pub fn parse_amount(raw: &str) -> Option<BigDecimal> {
    let mut s = raw.trim().trim_matches('"').trim().to_string();
    let mut negative = false;

    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        negative = true;
        s = s[1..s.len() - 1].trim().to_string();
    }

    let suffix = s
        .len()
        .checked_sub(2)
        .and_then(|at| s.get(at..))
        .map(|sfx| sfx.to_ascii_uppercase());
    match suffix.as_deref() {
        Some("DR") => {
            negative = !negative;
            s.truncate(s.len() - 2);
        }
        Some("CR") => s.truncate(s.len() - 2),
        _ => {}
    }

    let mut s = s.trim().to_string();
    if s.ends_with('-') {
        negative = !negative;
        s.pop();
    }

    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | '£' | '€' | '¥' | ',' | ' ' | '\u{a0}'))
        .collect();

    let digits = if let Some(rest) = cleaned.strip_prefix('-') {
        negative = !negative;
        rest
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        rest
    } else {
        cleaned.as_str()
    };

    if !digits.chars().any(|c| c.is_ascii_digit())
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || digits.matches('.').count() > 1
    {
        return None;
    }

    let value = BigDecimal::from_str(digits).ok()?;
    Some(if negative { -value } else { value })
}
