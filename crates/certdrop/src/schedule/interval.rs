//! Schedule interval parsing

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ScheduleError;

/// Longest accepted interval (100 years)
const MAX_INTERVAL_SECS: u64 = 100 * 365 * 86_400;

/// Unit of a [`ScheduleInterval`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl IntervalUnit {
    fn seconds(self) -> u64 {
        match self {
            Self::Days => 86_400,
            Self::Hours => 3_600,
            Self::Minutes => 60,
            Self::Seconds => 1,
        }
    }

    fn suffix(self) -> char {
        match self {
            Self::Days => 'd',
            Self::Hours => 'h',
            Self::Minutes => 'm',
            Self::Seconds => 's',
        }
    }
}

/// A positive, fixed daemon interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleInterval {
    unit: IntervalUnit,
    value: u64,
}

impl ScheduleInterval {
    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.value * self.unit.seconds())
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for ScheduleInterval {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_interval(s)
    }
}

/// Parse `<digits>[d|h|m|s]`; a bare number means days
pub fn parse_interval(spec: &str) -> Result<ScheduleInterval, ScheduleError> {
    let normalized = spec.trim().to_ascii_lowercase();
    let split = normalized
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(normalized.len());
    let (digits, suffix) = normalized.split_at(split);

    if digits.is_empty() {
        return Err(ScheduleError::InvalidFormat(spec.to_string()));
    }

    let unit = match suffix {
        "" | "d" => IntervalUnit::Days,
        "h" => IntervalUnit::Hours,
        "m" => IntervalUnit::Minutes,
        "s" => IntervalUnit::Seconds,
        _ => return Err(ScheduleError::InvalidFormat(spec.to_string())),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| ScheduleError::TooLarge(spec.to_string()))?;

    if value == 0 {
        return Err(ScheduleError::ZeroInterval(spec.to_string()));
    }

    match value.checked_mul(unit.seconds()) {
        Some(secs) if secs <= MAX_INTERVAL_SECS => Ok(ScheduleInterval { unit, value }),
        _ => Err(ScheduleError::TooLarge(spec.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        let cases = [
            ("1d", IntervalUnit::Days, 1, 86_400),
            ("12h", IntervalUnit::Hours, 12, 43_200),
            ("3600s", IntervalUnit::Seconds, 3600, 3600),
            ("30m", IntervalUnit::Minutes, 30, 1800),
            ("1", IntervalUnit::Days, 1, 86_400),
        ];

        for (spec, unit, value, secs) in cases {
            let interval = parse_interval(spec).unwrap();
            assert_eq!(interval.unit(), unit, "{}", spec);
            assert_eq!(interval.value(), value, "{}", spec);
            assert_eq!(interval.as_duration(), Duration::from_secs(secs), "{}", spec);
        }
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let interval: ScheduleInterval = " 12H ".parse().unwrap();
        assert_eq!(interval.unit(), IntervalUnit::Hours);
        assert_eq!(interval.to_string(), "12h");
    }

    #[test]
    fn test_parse_rejects_bad_formats() {
        for spec in ["abc", "", "d", "1w", "1.5h", "-1d", "1 d", "h12", "1dd"] {
            assert_eq!(
                parse_interval(spec),
                Err(ScheduleError::InvalidFormat(spec.to_string())),
                "{:?}",
                spec
            );
        }
    }

    #[test]
    fn test_parse_rejects_zero() {
        assert_eq!(
            parse_interval("0h"),
            Err(ScheduleError::ZeroInterval("0h".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_huge_values() {
        assert!(matches!(
            parse_interval("99999999999999999999999d"),
            Err(ScheduleError::TooLarge(_))
        ));
        assert!(matches!(parse_interval("40000d"), Err(ScheduleError::TooLarge(_))));
    }
}
