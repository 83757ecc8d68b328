//! Duration strings.
//!
//! Accepts the compact `1d2h3m` style as well as spelled-out units
//! ("1 day", "90 minutes"). Bare numbers are seconds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// A `Duration` that serializes to and from strings like `1d2h3m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DurationString(pub Duration);

impl DurationString {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Display for DurationString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut secs = self.0.as_secs();
        if secs == 0 {
            return f.write_str("0s");
        }
        let days = secs / 86_400;
        secs %= 86_400;
        let hours = secs / 3_600;
        secs %= 3_600;
        let mins = secs / 60;
        secs %= 60;
        let mut out = String::new();
        if days > 0 {
            out.push_str(&format!("{}d", days));
        }
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if mins > 0 {
            out.push_str(&format!("{}m", mins));
        }
        if secs > 0 {
            out.push_str(&format!("{}s", secs));
        }
        f.write_str(&out)
    }
}

impl Serialize for DurationString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DurationString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s)
            .map(DurationString)
            .map_err(serde::de::Error::custom)
    }
}

/// Parse a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }

    // Bare number: seconds.
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    let mut unit = String::new();
    let mut saw_component = false;

    let mut flush = |number: &mut String, unit: &mut String, total: &mut u64| -> Result<(), String> {
        if number.is_empty() {
            return Err(format!("missing number in duration '{}'", input));
        }
        let value: u64 = number
            .parse()
            .map_err(|_| format!("invalid number '{}' in duration", number))?;
        let multiplier = match unit.as_str() {
            "d" | "day" | "days" => 86_400,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
            "m" | "min" | "mins" | "minute" | "minutes" => 60,
            "s" | "sec" | "secs" | "second" | "seconds" => 1,
            other => return Err(format!("unknown duration unit '{}'", other)),
        };
        *total = total
            .checked_add(value.saturating_mul(multiplier))
            .ok_or_else(|| "duration overflow".to_string())?;
        number.clear();
        unit.clear();
        Ok(())
    };

    for c in text.chars() {
        if c.is_ascii_digit() {
            if !unit.is_empty() {
                flush(&mut number, &mut unit, &mut total)?;
                saw_component = true;
            }
            number.push(c);
        } else if c.is_ascii_alphabetic() {
            unit.push(c);
        } else if c.is_whitespace() {
            continue;
        } else {
            return Err(format!("unexpected character '{}' in duration", c));
        }
    }
    if !number.is_empty() || !unit.is_empty() {
        flush(&mut number, &mut unit, &mut total)?;
        saw_component = true;
    }
    if !saw_component {
        return Err(format!("could not parse duration '{}'", input));
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_style() {
        assert_eq!(
            parse_duration("1d2h3m").unwrap(),
            Duration::from_secs(86_400 + 7_200 + 180)
        );
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
    }

    #[test]
    fn test_spelled_out() {
        assert_eq!(parse_duration("1 day").unwrap(), Duration::from_secs(86_400));
        assert_eq!(
            parse_duration("90 minutes").unwrap(),
            Duration::from_secs(5_400)
        );
    }

    #[test]
    fn test_bare_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3x").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("d3").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let d = DurationString(parse_duration("1d2h3m").unwrap());
        assert_eq!(d.to_string(), "1d2h3m");
        assert_eq!(parse_duration(&d.to_string()).unwrap(), d.0);
    }

    #[test]
    fn test_serde() {
        #[derive(serde::Deserialize)]
        struct Holder {
            timeout: DurationString,
        }
        let h: Holder = toml::from_str(r#"timeout = "2h30m""#).unwrap();
        assert_eq!(h.timeout.as_duration(), Duration::from_secs(9_000));
    }
}
