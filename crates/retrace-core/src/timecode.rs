//! Timecode formatting and parsing for tag times.
//!
//! Times are `f64` seconds on the project clock. Display uses `m:ss` below
//! one hour and `h:mm:ss` above; parsing is tolerant of bare seconds,
//! `m:ss`, `h:mm:ss`, comma decimals, and a trailing unit word.

/// Format seconds as `m:ss` / `h:mm:ss`, with centiseconds when fractional.
pub fn format_timecode(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let whole = seconds.floor() as u64;
    let frac = seconds - whole as f64;
    let (h, m, s) = (whole / 3600, (whole % 3600) / 60, whole % 60);

    let mut out = if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    };
    if frac >= 0.005 {
        out.push_str(&format!(".{:02}", (frac * 100.0).round() as u64));
    }
    out
}

/// Parse a timecode back to seconds. Returns 0.0 for unparsable input.
pub fn parse_timecode(text: &str) -> f64 {
    let cleaned = text
        .trim()
        .trim_end_matches("seconds")
        .trim_end_matches("second")
        .trim_end_matches("secs")
        .trim_end_matches("sec")
        .trim_end_matches('s')
        .replace(',', ".");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0.0;
    }

    let parts: Vec<&str> = cleaned.split(':').collect();
    let mut total = 0.0;
    for part in &parts {
        total = total * 60.0 + part.trim().parse::<f64>().unwrap_or(0.0);
    }
    total.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_short() {
        assert_eq!(format_timecode(0.0), "0:00");
        assert_eq!(format_timecode(75.0), "1:15");
        assert_eq!(format_timecode(75.5), "1:15.50");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_timecode(3661.0), "1:01:01");
    }

    #[test]
    fn test_format_negative_clamps() {
        assert_eq!(format_timecode(-3.0), "0:00");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse_timecode("90"), 90.0);
        assert_eq!(parse_timecode("1:30"), 90.0);
        assert_eq!(parse_timecode("1:01:01"), 3661.0);
        assert_eq!(parse_timecode("2,5"), 2.5);
        assert_eq!(parse_timecode("12 sec"), 12.0);
        assert_eq!(parse_timecode(""), 0.0);
        assert_eq!(parse_timecode("garbage"), 0.0);
    }

    #[test]
    fn test_roundtrip() {
        for t in [0.0, 12.25, 59.0, 61.0, 3599.0, 3600.0, 7262.5] {
            let parsed = parse_timecode(&format_timecode(t));
            assert!((parsed - t).abs() < 0.01, "roundtrip of {t} gave {parsed}");
        }
    }
}
