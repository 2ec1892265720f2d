// Utility helpers for parsing and basic statistics.
//
// This module centralizes the forgiving CSV number handling and the
// number formatting used in console previews.
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters, except the `e`/`E`
///   of exponent notation (the CSV writer emits `1e-7`, `1e17`).
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s
        .chars()
        .any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'))
    {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Trimmed, non-empty text field.
pub fn clean_text(s: Option<String>) -> Option<String> {
    let s = s?.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Name safe to embed in a file name: anything outside `[A-Za-z0-9_=.-]`
/// becomes `_`, and a leading dot is replaced so the name cannot be `..`.
pub fn file_safe_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with('.') {
        out.replace_range(..1, "_");
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Absolute percentage error of `calc` against `reference`.
pub fn pct_error(reference: f64, calc: f64) -> f64 {
    (calc - reference).abs() / reference.abs() * 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimal places plus thousands separators (e.g. `1,234,567.89`).
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

/// Like [`format_number`], rendering `None` as a dash.
pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    match n {
        Some(v) => format_number(v, decimals),
        None => "-".to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_with_separators() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("12abc")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn accepts_exponent_notation() {
        assert_eq!(parse_f64_safe(Some("1e-7")), Some(1e-7));
        assert_eq!(parse_f64_safe(Some("1E17")), Some(1e17));
        assert_eq!(parse_f64_safe(Some("2.5e3")), Some(2500.0));
        assert_eq!(parse_f64_safe(Some("1e")), None);
        assert_eq!(parse_f64_safe(Some("inf")), None);
        assert_eq!(parse_f64_safe(Some("nan")), None);
    }

    #[test]
    fn file_safe_name_keeps_names_inside_directory() {
        assert_eq!(file_safe_name("cov_aps"), "cov_aps");
        assert_eq!(file_safe_name("../etc/passwd"), "_._etc_passwd");
        assert_eq!(file_safe_name("a/b c"), "a_b_c");
        assert_eq!(file_safe_name(".."), "_.");
        assert_eq!(file_safe_name(""), "_");
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[10.0, 20.0]), Some(15.0));
    }

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-5.0, 2), "-5.00");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_opt(None, 2), "-");
        assert_eq!(format_int(9855), "9,855");
    }
}
