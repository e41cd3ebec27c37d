//! Tolerant parsing of episode air dates.
//!
//! The catalog stores air dates as free text entered by editors, so besides
//! ISO dates we see slash-separated dates, the `YYYY年M月D日` form, unpadded
//! months and days, and strings carrying several dates where a regional note
//! in parentheses follows the first one.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日"];

fn loose_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})日?$")
            .expect("Invalid regex pattern defined in code")
    })
}

/// Parses an air date, returning `None` for anything unrecognised.
#[must_use]
pub fn parse_airdate(raw: &str) -> Option<NaiveDate> {
    let mut cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    // "2015-02-01(一部地域のみ)/2015-02-08" -> "2015-02-01"
    if let Some(pos) = cleaned.find(['(', '（']) {
        cleaned = &cleaned[..pos];
    }

    let compact: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&compact, format) {
            return Some(date);
        }
    }

    let caps = loose_date_regex().captures(&compact)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
