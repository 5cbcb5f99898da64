//! Parsing and formatting of estimate durations such as `1w 2d 3h 30m`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{FieldError, Result};

static DURATION_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(\d+(?:\.\d+)?)\s*(weeks?|w|days?|d|hours?|h|minutes?|mins?|m)\s*",
    )
    .expect("invalid duration regex")
});

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Working-time units used to convert days and weeks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationFormatter {
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,
    #[serde(default = "default_days_per_week")]
    pub days_per_week: f64,
}

const fn default_hours_per_day() -> f64 {
    8.0
}

const fn default_days_per_week() -> f64 {
    5.0
}

impl Default for DurationFormatter {
    fn default() -> Self {
        Self {
            hours_per_day: default_hours_per_day(),
            days_per_week: default_days_per_week(),
        }
    }
}

impl DurationFormatter {
    #[must_use]
    pub const fn new(hours_per_day: f64, days_per_week: f64) -> Self {
        Self {
            hours_per_day,
            days_per_week,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn day_ms(&self) -> i64 {
        (self.hours_per_day * HOUR_MS as f64).round() as i64
    }

    #[allow(clippy::cast_possible_truncation)]
    fn week_ms(&self) -> i64 {
        (self.days_per_week * self.day_ms() as f64).round() as i64
    }

    /// Parse a duration into milliseconds.
    ///
    /// A bare number is minutes. Unit tokens may repeat and appear in any
    /// order; anything that is not a token makes the whole input invalid.
    ///
    /// # Errors
    /// Returns [`FieldError::InvalidDuration`] for blank or malformed input.
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(&self, input: &str) -> Result<i64> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FieldError::InvalidDuration(input.to_string()));
        }
        if let Ok(minutes) = trimmed.parse::<i64>() {
            if minutes < 0 {
                return Err(FieldError::InvalidDuration(input.to_string()));
            }
            return minutes
                .checked_mul(MINUTE_MS)
                .ok_or_else(|| FieldError::InvalidDuration(input.to_string()));
        }

        let mut rest = trimmed;
        let mut total = 0.0_f64;
        while !rest.is_empty() {
            let Some(caps) = DURATION_TOKEN_REGEX.captures(rest) else {
                return Err(FieldError::InvalidDuration(input.to_string()));
            };
            let value: f64 = caps[1]
                .parse()
                .map_err(|_| FieldError::InvalidDuration(input.to_string()))?;
            let unit = match caps[2].to_ascii_lowercase().chars().next() {
                Some('w') => self.week_ms(),
                Some('d') => self.day_ms(),
                Some('h') => HOUR_MS,
                _ => MINUTE_MS,
            };
            total += value * unit as f64;
            rest = &rest[caps[0].len()..];
        }
        // 2^63 is the first float past i64::MAX.
        if !total.is_finite() || total >= 9_223_372_036_854_775_808.0 {
            return Err(FieldError::InvalidDuration(input.to_string()));
        }
        Ok(total.round() as i64)
    }

    /// Whether `input` parses as a duration.
    #[must_use]
    pub fn is_valid(&self, input: &str) -> bool {
        self.parse(input).is_ok()
    }

    /// Format milliseconds in the short `1w 2d 3h 4m` form.
    ///
    /// Zero formats as `0m`; sub-minute remainders are dropped.
    #[must_use]
    pub fn short_format(&self, millis: i64) -> String {
        if millis <= 0 {
            return "0m".to_string();
        }
        let mut remaining = millis;
        let mut parts = Vec::new();
        for (unit, suffix) in [
            (self.week_ms(), 'w'),
            (self.day_ms(), 'd'),
            (HOUR_MS, 'h'),
            (MINUTE_MS, 'm'),
        ] {
            if unit <= 0 {
                continue;
            }
            let count = remaining / unit;
            if count > 0 {
                parts.push(format!("{count}{suffix}"));
                remaining -= count * unit;
            }
        }
        if parts.is_empty() {
            "0m".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Format an optional estimate; `None` stays `None`.
    #[must_use]
    pub fn format_opt(&self, millis: Option<i64>) -> Option<String> {
        millis.map(|ms| self.short_format(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_units() {
        let f = DurationFormatter::default();

        assert_eq!(f.parse("1h").unwrap(), HOUR_MS);
        assert_eq!(f.parse("30m").unwrap(), 30 * MINUTE_MS);
        assert_eq!(f.parse("1d").unwrap(), 8 * HOUR_MS);
        assert_eq!(f.parse("1w").unwrap(), 40 * HOUR_MS);
        assert_eq!(f.parse("1w 2d 3h 4m").unwrap(), (40 + 16 + 3) * HOUR_MS + 4 * MINUTE_MS);
        assert_eq!(f.parse("2 hours 15 minutes").unwrap(), 2 * HOUR_MS + 15 * MINUTE_MS);
        assert_eq!(f.parse("1.5h").unwrap(), 90 * MINUTE_MS);
    }

    #[test]
    fn test_bare_number_is_minutes() {
        assert_eq!(DurationFormatter::default().parse("45").unwrap(), 45 * MINUTE_MS);
        assert_eq!(DurationFormatter::default().parse("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let f = DurationFormatter::default();

        assert!(f.parse("").is_err());
        assert!(f.parse("   ").is_err());
        assert!(f.parse("abc").is_err());
        assert!(f.parse("1h xyz").is_err());
        assert!(f.parse("-5").is_err());
        assert!(!f.is_valid("3x"));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let f = DurationFormatter::default();

        assert!(f.parse("999999999999999999").is_err());
        assert!(f.parse("999999999999999999w").is_err());
        assert!(f.parse("99999999999999999999999999999h").is_err());
        assert_eq!(f.parse("153722867280912").unwrap(), 153_722_867_280_912 * MINUTE_MS);
    }

    #[test]
    fn test_custom_working_time() {
        let f = DurationFormatter::new(6.0, 4.0);
        assert_eq!(f.parse("1d").unwrap(), 6 * HOUR_MS);
        assert_eq!(f.parse("1w").unwrap(), 24 * HOUR_MS);
        assert_eq!(f.short_format(27 * HOUR_MS), "1w 3h");
    }

    #[test]
    fn test_short_format() {
        let f = DurationFormatter::default();

        assert_eq!(f.short_format(0), "0m");
        assert_eq!(f.short_format(HOUR_MS), "1h");
        assert_eq!(f.short_format(90 * MINUTE_MS), "1h 30m");
        assert_eq!(f.short_format(49 * HOUR_MS), "1w 1d 1h");
        assert_eq!(f.format_opt(None), None);
    }
}
