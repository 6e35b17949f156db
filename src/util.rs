// Utility helpers for parsing and basic statistics.
//
// All the forgiving cell handling lives here: every helper answers `None`
// for a value it cannot interpret, and the caller decides what "missing"
// turns into.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

static MONTH_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})").expect("valid regex"));

/// Parse a cell into `f64`, tolerating thousands separators and padding.
///
/// Non-numeric text and non-finite results (`NaN`, `inf`) come back as
/// `None`.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar year. Spreadsheet exports often write `2018.0`, so a
/// whole-valued float is accepted too.
pub fn parse_year_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(y) = s.parse::<i32>() {
        return Some(y);
    }
    let f = s.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f.abs() <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

/// The month token used to build an invoice date: the first one- or
/// two-digit run in the value, or the raw value when there is none.
pub fn month_token(month: &str) -> &str {
    match MONTH_DIGITS.captures(month).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => month.trim(),
    }
}

/// First-of-month date for a year and a raw month value.
///
/// A token that is not a month number (e.g. a spelled-out month name) gives
/// `None`; no locale guessing is attempted.
pub fn invoice_date(year: i32, month: &str) -> Option<NaiveDate> {
    let token = month_token(month);
    let m: u32 = token.parse().ok()?;
    NaiveDate::from_ymd_opt(year, m, 1)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Percentage of `part` in `total`, rounded to two places; zero when the
/// total is not positive.
pub fn share_pct(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(part / total * 100.0)
    } else {
        0.0
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators
    // (e.g. `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
