//! Timestamp conversion between seconds and the clock-time strings used by
//! SubRip, WebVTT and TTML.
//!
//! Seconds are rounded to the nearest millisecond, ties away from zero, on the
//! total millisecond count. Carries therefore propagate into seconds, minutes
//! and hours: `59.9996` formats as `00:01:00,000`.

use crate::error::{SubnormError, SubnormResult};
use regex::Regex;
use std::sync::LazyLock;

static TTML_CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,}):(\d{2}):(\d{2})\.(\d{3})$").expect("Valid TTML clock-time regex")
});

/// Format seconds as a SubRip timestamp, `HH:MM:SS,mmm`
pub fn format_timestamp(seconds: f64) -> SubnormResult<String> {
    format_with_separator(seconds, ',')
}

/// Format seconds as a WebVTT timestamp, `HH:MM:SS.mmm`
pub fn format_vtt_timestamp(seconds: f64) -> SubnormResult<String> {
    format_with_separator(seconds, '.')
}

/// Parse a TTML clock-time string (`HH:MM:SS.mmm`) into seconds
pub fn parse_ttml_clock_time(value: &str) -> SubnormResult<f64> {
    let captures = TTML_CLOCK_TIME
        .captures(value)
        .ok_or_else(|| SubnormError::invalid_timestamp(value))?;

    let field = |group: usize| -> SubnormResult<u64> {
        captures[group]
            .parse::<u64>()
            .map_err(|_| SubnormError::invalid_timestamp(value))
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let millis = field(4)?;

    if minutes >= 60 || seconds >= 60 {
        return Err(SubnormError::invalid_timestamp(value));
    }

    let total_millis = hours
        .checked_mul(3_600_000)
        .and_then(|h| h.checked_add(minutes * 60_000 + seconds * 1000 + millis))
        .ok_or_else(|| SubnormError::invalid_timestamp(value))?;

    Ok(total_millis as f64 / 1000.0)
}

/// Round seconds to whole milliseconds, rejecting negative, non-finite and
/// unrepresentable input
pub(crate) fn to_millis(seconds: f64) -> SubnormResult<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SubnormError::invalid_timestamp(seconds));
    }

    let millis = (seconds * 1000.0).round();
    if millis >= u64::MAX as f64 {
        return Err(SubnormError::invalid_timestamp(seconds));
    }
    Ok(millis as u64)
}

fn format_with_separator(seconds: f64, separator: char) -> SubnormResult<String> {
    let total_millis = to_millis(seconds)?;

    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    Ok(format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, separator, millis
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0).unwrap(), "00:00:00,000");
        assert_eq!(format_timestamp(3661.5).unwrap(), "01:01:01,500");
        assert_eq!(format_timestamp(1.25).unwrap(), "00:00:01,250");
        assert_eq!(format_timestamp(45296.789).unwrap(), "12:34:56,789");
    }

    #[test]
    fn test_format_timestamp_rounds_and_carries() {
        assert_eq!(format_timestamp(1.9995).unwrap(), "00:00:02,000");
        assert_eq!(format_timestamp(1.9996).unwrap(), "00:00:02,000");
        assert_eq!(format_timestamp(59.9996).unwrap(), "00:01:00,000");
        assert_eq!(format_timestamp(3599.9999).unwrap(), "01:00:00,000");
        assert_eq!(format_timestamp(0.0004).unwrap(), "00:00:00,000");
    }

    #[test]
    fn test_format_timestamp_large_hours() {
        assert_eq!(format_timestamp(360_000.0).unwrap(), "100:00:00,000");
    }

    #[test]
    fn test_format_timestamp_rejects_invalid() {
        assert!(matches!(
            format_timestamp(-1.0),
            Err(SubnormError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            format_timestamp(f64::NAN),
            Err(SubnormError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            format_timestamp(f64::INFINITY),
            Err(SubnormError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_format_timestamp_rejects_overflow() {
        for seconds in [1e20, 1.9e16, f64::MAX] {
            assert!(
                matches!(
                    format_timestamp(seconds),
                    Err(SubnormError::InvalidTimestamp { .. })
                ),
                "Should reject: {}",
                seconds
            );
        }
        assert!(format_timestamp(1e15).is_ok());
    }

    #[test]
    fn test_format_vtt_timestamp() {
        assert_eq!(format_vtt_timestamp(3661.5).unwrap(), "01:01:01.500");
    }

    #[test]
    fn test_parse_ttml_clock_time() {
        assert_eq!(parse_ttml_clock_time("00:01:02.250").unwrap(), 62.25);
        assert_eq!(parse_ttml_clock_time("00:00:00.000").unwrap(), 0.0);
        assert_eq!(parse_ttml_clock_time("01:00:00.001").unwrap(), 3600.001);
        assert_eq!(parse_ttml_clock_time("100:00:00.000").unwrap(), 360_000.0);
    }

    #[test]
    fn test_parse_ttml_clock_time_rejects_deviations() {
        let invalid = [
            "bad",
            "",
            "00:01.250",
            "00:00:01:02.250",
            "00:01:02,250",
            "00:01:02.25",
            "00:01:02",
            "0:01:02.250",
            "00:60:00.000",
            "00:00:60.000",
            "aa:bb:cc.ddd",
            " 00:01:02.250",
        ];

        for value in invalid {
            assert!(
                matches!(
                    parse_ttml_clock_time(value),
                    Err(SubnormError::InvalidTimestamp { .. })
                ),
                "Should reject: {:?}",
                value
            );
        }
    }

    proptest! {
        #[test]
        fn prop_format_matches_millisecond_fields(ms in 0u64..400_000_000) {
            let formatted = format_timestamp(ms as f64 / 1000.0).unwrap();
            let expected = format!(
                "{:02}:{:02}:{:02},{:03}",
                ms / 3_600_000,
                (ms % 3_600_000) / 60_000,
                (ms % 60_000) / 1000,
                ms % 1000
            );
            prop_assert_eq!(formatted, expected);
        }

        #[test]
        fn prop_clock_time_reads_back(ms in 0u64..400_000_000) {
            let clock = format_vtt_timestamp(ms as f64 / 1000.0).unwrap();
            let seconds = parse_ttml_clock_time(&clock).unwrap();
            prop_assert_eq!(to_millis(seconds).unwrap(), ms);
        }
    }
}
