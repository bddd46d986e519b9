//! Printed page ranges such as `1-24` or `xi-xv`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingScheme {
    Arabic,
    Roman,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
    pub scheme: NumberingScheme,
}

impl PageRange {
    /// Number of printed pages the range claims to cover.
    pub fn nominal_page_count(&self) -> u32 {
        self.last - self.first + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed page range {raw:?}: expected two integers or two roman numerals")]
pub struct MalformedPageRange {
    pub raw: String,
}

const MAX_ROMAN: u32 = 3999;

/// Parses a range token with any label prefix (`pp `) already removed.
///
/// Both ends must use the same scheme. Arabic is tried first, then roman.
pub fn parse(raw: &str) -> Result<PageRange, MalformedPageRange> {
    let malformed = || MalformedPageRange {
        raw: raw.to_owned(),
    };

    let trimmed = raw.trim();
    let (first, last) = match trimmed.split_once(&['-', '\u{2013}'][..]) {
        Some((first, last)) => (first.trim(), last.trim()),
        None => (trimmed, trimmed),
    };
    if first.is_empty() || last.is_empty() {
        return Err(malformed());
    }

    let range = if let (Ok(first), Ok(last)) = (first.parse::<u32>(), last.parse::<u32>()) {
        PageRange {
            first,
            last,
            scheme: NumberingScheme::Arabic,
        }
    } else if let (Some(first), Some(last)) = (parse_roman(first), parse_roman(last)) {
        PageRange {
            first,
            last,
            scheme: NumberingScheme::Roman,
        }
    } else {
        return Err(malformed());
    };

    if range.first > range.last {
        return Err(malformed());
    }
    Ok(range)
}

/// Parses a canonical roman numeral, ignoring case.
pub fn parse_roman(token: &str) -> Option<u32> {
    if token.is_empty() {
        return None;
    }

    let upper = token.to_ascii_uppercase();
    let mut total = 0_u32;
    let mut prev = 0_u32;
    for ch in upper.chars().rev() {
        let value = roman_digit(ch)?;
        if value < prev {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            prev = value;
        }
    }

    if total == 0 || total > MAX_ROMAN {
        return None;
    }
    // Rejects non-canonical spellings like `IIII` or `IC`.
    (to_roman(total) == upper).then_some(total)
}

fn roman_digit(ch: char) -> Option<u32> {
    match ch {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    }
}

fn to_roman(mut value: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut out = String::new();
    for &(step, numeral) in TABLE {
        while value >= step {
            out.push_str(numeral);
            value -= step;
        }
    }
    out
}
