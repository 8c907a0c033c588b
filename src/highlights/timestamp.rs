//! Timestamp parsing for highlight bounds.
//!
//! Detectors hand back either `HH:MM:SS` or `MM:SS`. Both are reduced to a
//! whole number of seconds and rendered back as zero-padded `HH:MM:SS`.

use std::fmt;

/// Timestamp parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("timestamp '{0}' must have two or three colon-separated fields")]
    FieldCount(String),

    #[error("timestamp '{text}' does not match {expected}")]
    FormatMismatch { text: String, expected: TimestampFormat },

    #[error("invalid {field} field '{value}' in timestamp")]
    InvalidField { field: &'static str, value: String },

    #[error("timestamp '{0}' is out of range")]
    OutOfRange(String),
}

/// Accepted textual layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    HourMinuteSecond,
    MinuteSecond,
}

impl TimestampFormat {
    /// Infer the layout from the number of colon-separated fields
    pub fn detect(text: &str) -> Result<Self, FormatError> {
        match text.trim().split(':').count() {
            3 => Ok(Self::HourMinuteSecond),
            2 => Ok(Self::MinuteSecond),
            _ => Err(FormatError::FieldCount(text.to_string())),
        }
    }

    fn field_count(self) -> usize {
        match self {
            Self::HourMinuteSecond => 3,
            Self::MinuteSecond => 2,
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HourMinuteSecond => write!(f, "HH:MM:SS"),
            Self::MinuteSecond => write!(f, "MM:SS"),
        }
    }
}

/// Parse `text` in the given layout into whole seconds.
///
/// The seconds field may carry a fractional part, which is truncated since
/// clip boundaries are second-granular.
pub fn parse(text: &str, format: TimestampFormat) -> Result<u64, FormatError> {
    let trimmed = text.trim();
    let fields: Vec<&str> = trimmed.split(':').collect();

    if fields.len() != 2 && fields.len() != 3 {
        return Err(FormatError::FieldCount(text.to_string()));
    }
    if fields.len() != format.field_count() {
        return Err(FormatError::FormatMismatch {
            text: text.to_string(),
            expected: format,
        });
    }

    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (parse_integer("hours", h)?, parse_integer("minutes", m)?, parse_seconds_field(s)?),
        [m, s] => (0, parse_integer("minutes", m)?, parse_seconds_field(s)?),
        _ => unreachable!("field count checked above"),
    };

    hours
        .checked_mul(3600)
        .and_then(|total| total.checked_add(minutes.checked_mul(60)?))
        .and_then(|total| total.checked_add(seconds))
        .ok_or_else(|| FormatError::OutOfRange(text.to_string()))
}

/// Parse a timestamp whose layout is inferred from its field count
pub fn parse_seconds(text: &str) -> Result<u64, FormatError> {
    parse(text, TimestampFormat::detect(text)?)
}

/// Render whole seconds as zero-padded `HH:MM:SS`
pub fn format(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Canonicalize a timestamp in either accepted layout
pub fn normalize(text: &str) -> Result<String, FormatError> {
    parse_seconds(text).map(format)
}

fn parse_integer(field: &'static str, value: &str) -> Result<u64, FormatError> {
    // u64::from_str accepts a leading '+', which is not a valid timestamp field
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::InvalidField {
            field,
            value: value.to_string(),
        });
    }

    value.parse().map_err(|_| FormatError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_seconds_field(value: &str) -> Result<u64, FormatError> {
    match value.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FormatError::InvalidField {
                    field: "seconds",
                    value: value.to_string(),
                });
            }
            parse_integer("seconds", whole)
        }
        None => parse_integer("seconds", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_layouts() {
        assert_eq!(parse("01:30:00", TimestampFormat::HourMinuteSecond), Ok(5400));
        assert_eq!(parse("5:30", TimestampFormat::MinuteSecond), Ok(330));
        assert_eq!(parse_seconds("00:02:15"), Ok(135));
        assert_eq!(parse_seconds("00:15"), Ok(15));
    }

    #[test]
    fn test_format_is_zero_padded() {
        assert_eq!(format(0), "00:00:00");
        assert_eq!(format(330), "00:05:30");
        assert_eq!(format(3661), "01:01:01");
        assert_eq!(format(100 * 3600), "100:00:00");
    }

    #[test]
    fn test_minute_second_canonicalizes() {
        let seconds = parse("5:30", TimestampFormat::MinuteSecond).unwrap();
        assert_eq!(format(seconds), "00:05:30");
    }

    #[test]
    fn test_fractional_seconds_are_truncated() {
        assert_eq!(parse_seconds("00:00:10.750"), Ok(10));
        assert_eq!(normalize("1:05.5"), Ok("00:01:05".to_string()));
    }

    #[test]
    fn test_out_of_range_fields_roll_over() {
        assert_eq!(normalize("90:00"), Ok("01:30:00".to_string()));
        assert_eq!(normalize("00:00:75"), Ok("00:01:15".to_string()));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for input in ["5:30", "00:05:30", "1:02:03", "90:75", "0:0", "12:34.9"] {
            let once = normalize(input).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        assert!(matches!(parse_seconds("42"), Err(FormatError::FieldCount(_))));
        assert!(matches!(parse_seconds("1:2:3:4"), Err(FormatError::FieldCount(_))));
        assert!(matches!(parse_seconds(""), Err(FormatError::FieldCount(_))));
    }

    #[test]
    fn test_rejects_layout_mismatch() {
        assert!(matches!(
            parse("00:05:30", TimestampFormat::MinuteSecond),
            Err(FormatError::FormatMismatch { .. })
        ));
        assert!(matches!(
            parse("05:30", TimestampFormat::HourMinuteSecond),
            Err(FormatError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_non_integer_fields() {
        for input in ["aa:10", "-1:10", "+1:10", "00::10", "00:10.", "1.5:10", "00:1x:10", "00:10.5.5"] {
            assert!(
                matches!(parse_seconds(input), Err(FormatError::InvalidField { .. })),
                "input {input}"
            );
        }
    }

    #[test]
    fn test_overflowing_timestamps_are_rejected() {
        assert!(matches!(
            parse_seconds("9999999999999999:00:00"),
            Err(FormatError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_seconds("999999999999999999:00"),
            Err(FormatError::OutOfRange(_))
        ));
        assert!(matches!(
            normalize("0:0:18446744073709551615"),
            Ok(_)
        ));
        assert!(matches!(
            parse_seconds("0:1:18446744073709551615"),
            Err(FormatError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(parse_seconds(" 00:00:20 "), Ok(20));
    }
}
