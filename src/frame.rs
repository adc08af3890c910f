//! Sensor line parsing.

use std::str::FromStr;

use crate::error::FrameError;
use crate::types::{SpectralFrame, CHANNELS};

pub const DELIMITER: char = ',';

/// Parses one line of sensor output into a frame.
///
/// Surrounding whitespace on the line and on each field is ignored. Non-finite
/// values are rejected since the fingerprint file cannot hold them.
pub fn parse_frame(line: &str) -> Result<SpectralFrame, FrameError> {
    let fields: Vec<&str> = line.trim().split(DELIMITER).collect();
    if fields.len() != CHANNELS {
        return Err(FrameError::Malformed {
            fields: fields.len(),
            expected: CHANNELS,
        });
    }

    let mut values = [0.0; CHANNELS];
    for (index, (slot, raw)) in values.iter_mut().zip(fields).enumerate() {
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => *slot = v,
            _ => {
                return Err(FrameError::InvalidNumeric {
                    index,
                    field: raw.to_string(),
                })
            }
        }
    }
    Ok(SpectralFrame::new(values))
}

impl FromStr for SpectralFrame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_frame(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_of(n: usize) -> String {
        (0..n).map(|i| format!("{}.5", i)).collect::<Vec<_>>().join(",")
    }

    #[test]
    fn test_parses_eighteen_fields() {
        let frame = parse_frame(&line_of(18)).unwrap();
        assert_eq!(frame.values()[0], 0.5);
        assert_eq!(frame.values()[17], 17.5);
    }

    #[test]
    fn test_tolerates_line_ending_and_padding() {
        let line = format!(" {}\r\n", line_of(18).replace(',', ", "));
        assert!(parse_frame(&line).is_ok());
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        assert_eq!(
            parse_frame(&line_of(17)),
            Err(FrameError::Malformed { fields: 17, expected: 18 })
        );
        assert_eq!(
            parse_frame(&line_of(19)),
            Err(FrameError::Malformed { fields: 19, expected: 18 })
        );
        assert!(matches!(parse_frame(""), Err(FrameError::Malformed { fields: 1, .. })));
    }

    #[test]
    fn test_non_numeric_field_is_invalid() {
        let mut fields: Vec<String> = (0..18).map(|i| i.to_string()).collect();
        fields[4] = "abc".into();
        assert_eq!(
            parse_frame(&fields.join(",")),
            Err(FrameError::InvalidNumeric { index: 4, field: "abc".into() })
        );
    }

    #[test]
    fn test_non_finite_is_invalid() {
        let mut fields: Vec<String> = (0..18).map(|i| i.to_string()).collect();
        fields[0] = "NaN".into();
        assert!(matches!(
            parse_frame(&fields.join(",")),
            Err(FrameError::InvalidNumeric { index: 0, .. })
        ));
        fields[0] = "inf".into();
        assert!(parse_frame(&fields.join(",")).is_err());
    }

    #[test]
    fn test_round_trips_through_to_line() {
        let frame: SpectralFrame = line_of(18).parse().unwrap();
        assert_eq!(parse_frame(&frame.to_line()).unwrap(), frame);
    }
}
