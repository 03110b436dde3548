//! Compact duration strings ("5s", "3m", "2h", "1d", "1w") decoded to seconds

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    Empty,
    InvalidUnit(char),
    InvalidMagnitude(String),
}

impl std::fmt::Display for DurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationError::Empty => write!(f, "empty duration string"),
            DurationError::InvalidUnit(unit) => write!(f, "unknown duration unit '{}'", unit),
            DurationError::InvalidMagnitude(text) => {
                write!(f, "invalid duration magnitude in '{}'", text)
            }
        }
    }
}

impl std::error::Error for DurationError {}

/// Seconds per unit suffix
fn unit_seconds(unit: char) -> Option<i64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(60 * 60 * 24),
        'w' => Some(60 * 60 * 24 * 7),
        _ => None,
    }
}

/// Decode a duration string into whole seconds.
///
/// The last character is the unit, everything before it is a (possibly
/// signed) integer magnitude. Fractions are not supported.
pub fn decode(text: &str) -> Result<i64, DurationError> {
    let unit = text.chars().last().ok_or(DurationError::Empty)?;
    let multiplier = unit_seconds(unit).ok_or(DurationError::InvalidUnit(unit))?;

    let magnitude = &text[..text.len() - unit.len_utf8()];
    let value: i64 = magnitude
        .parse()
        .map_err(|_| DurationError::InvalidMagnitude(text.to_string()))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| DurationError::InvalidMagnitude(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_units() {
        assert_eq!(decode("90s"), Ok(90));
        assert_eq!(decode("2m"), Ok(120));
        assert_eq!(decode("1h"), Ok(3600));
        assert_eq!(decode("1d"), Ok(86400));
        assert_eq!(decode("1w"), Ok(604800));
    }

    #[test]
    fn test_decode_signed_and_zero() {
        assert_eq!(decode("-3m"), Ok(-180));
        assert_eq!(decode("+4s"), Ok(4));
        assert_eq!(decode("0h"), Ok(0));
    }

    #[test]
    fn test_decode_invalid_unit() {
        assert_eq!(decode("5x"), Err(DurationError::InvalidUnit('x')));
        assert_eq!(decode("12"), Err(DurationError::InvalidUnit('2')));
    }

    #[test]
    fn test_decode_invalid_magnitude() {
        assert_eq!(decode(""), Err(DurationError::Empty));
        assert!(matches!(decode("s"), Err(DurationError::InvalidMagnitude(_))));
        assert!(matches!(decode("1.5h"), Err(DurationError::InvalidMagnitude(_))));
        assert!(matches!(
            decode("9223372036854775807w"),
            Err(DurationError::InvalidMagnitude(_))
        ));
    }
}
