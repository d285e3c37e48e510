//! Formatting helpers for the end-of-run summary.

use std::time::Duration;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use bf_cli_common::format_number;
///
/// assert_eq!(format_number(0), "0");
/// assert_eq!(format_number(1234567), "1,234,567");
/// ```
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a throughput in rows per second.
pub fn format_rate(rows_per_second: f64) -> String {
    if rows_per_second >= 1000.0 {
        format!("{} rows/s", format_number(rows_per_second.round() as u64))
    } else {
        format!("{rows_per_second:.1} rows/s")
    }
}

/// Formats an elapsed time as `1h 02m 03s`, `2m 05s` or `4.20s`.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(12), "12");
        assert_eq!(format_number(123), "123");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(123456), "123,456");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.0), "0.0 rows/s");
        assert_eq!(format_rate(512.25), "512.2 rows/s");
        assert_eq!(format_rate(12345.6), "12,346 rows/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.20s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
