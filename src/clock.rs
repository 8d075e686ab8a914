use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use std::fmt::Write;
use std::str::FromStr;

/// Format used for the envelope `time` field.
pub const DEFAULT_DELIVERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Format used for the console timestamp block.
pub const DEFAULT_CONSOLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Time zone a timestamp is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    Utc,
    Local,
    Fixed(FixedOffset),
    /// IANA zone, e.g. `Asia/Tehran`.
    Named(Tz),
}

impl FromStr for TimeZone {
    type Err = String;

    /// Accepts `UTC`, `Z`, `local`, an offset such as `+03:30` / `-0500`,
    /// or an IANA zone name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(TimeZone::Utc),
            "local" => return Ok(TimeZone::Local),
            _ => {}
        }

        let invalid = || format!("invalid time zone offset: {}", s);
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => {
                return s
                    .parse::<Tz>()
                    .map(TimeZone::Named)
                    .map_err(|_| format!("unknown time zone: {}", s))
            }
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if (digits.len() != 2 && digits.len() != 4) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = if digits.len() == 4 {
            digits[2..].parse().map_err(|_| invalid())?
        } else {
            0
        };
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(TimeZone::Fixed)
            .ok_or_else(invalid)
    }
}

/// Renders instants as strings in a configured zone and strftime format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamper {
    pub zone: TimeZone,
    pub format: String,
}

impl Timestamper {
    /// Build a timestamper without checking `format`; see [`Timestamper::parse`].
    pub fn new(zone: TimeZone, format: impl Into<String>) -> Self {
        Timestamper { zone, format: format.into() }
    }

    /// Build a timestamper, rejecting strftime patterns chrono cannot render.
    pub fn parse(zone: TimeZone, format: impl Into<String>) -> Result<Self, String> {
        let format = format.into();
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid time format: {}", format));
        }
        Ok(Timestamper { zone, format })
    }

    /// Render `instant`. An unrenderable pattern falls back to RFC 3339.
    pub fn format(&self, instant: &DateTime<Utc>) -> String {
        let mut out = String::new();
        let written = match self.zone {
            TimeZone::Utc => write!(out, "{}", instant.format(&self.format)),
            TimeZone::Local => write!(out, "{}", instant.with_timezone(&Local).format(&self.format)),
            TimeZone::Fixed(offset) => write!(out, "{}", instant.with_timezone(&offset).format(&self.format)),
            TimeZone::Named(tz) => write!(out, "{}", instant.with_timezone(&tz).format(&self.format)),
        };
        match written {
            Ok(()) => out,
            Err(_) => instant.to_rfc3339(),
        }
    }

    pub fn now(&self) -> String {
        self.format(&Utc::now())
    }
}

impl Default for Timestamper {
    fn default() -> Self {
        Timestamper::new(TimeZone::Utc, DEFAULT_DELIVERY_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn parses_zones() {
        assert_eq!("UTC".parse::<TimeZone>().unwrap(), TimeZone::Utc);
        assert_eq!("local".parse::<TimeZone>().unwrap(), TimeZone::Local);
        assert_eq!(
            "+03:30".parse::<TimeZone>().unwrap(),
            TimeZone::Fixed(FixedOffset::east_opt(12_600).unwrap())
        );
        assert_eq!(
            "-0500".parse::<TimeZone>().unwrap(),
            TimeZone::Fixed(FixedOffset::west_opt(18_000).unwrap())
        );
        assert_eq!("Asia/Tehran".parse::<TimeZone>().unwrap(), TimeZone::Named(Tz::Asia__Tehran));
        assert!("Mars/Olympus".parse::<TimeZone>().is_err());
        assert!("+03:75".parse::<TimeZone>().is_err());
    }

    #[test]
    fn formats_in_fixed_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let stamper = Timestamper::new("+03:30".parse().unwrap(), DEFAULT_DELIVERY_FORMAT);
        assert_eq!(stamper.format(&instant), "2024-03-01T15:30:00+0330");

        let stamper = Timestamper::new(TimeZone::Utc, DEFAULT_CONSOLE_FORMAT);
        assert_eq!(stamper.format(&instant), "2024-03-01 12:00:00");
    }

    #[test]
    fn formats_in_named_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let stamper = Timestamper::new("Asia/Tehran".parse().unwrap(), DEFAULT_DELIVERY_FORMAT);
        assert_eq!(stamper.format(&instant), "2024-03-01T15:30:00+0330");
    }

    #[test]
    fn bad_pattern_is_rejected_up_front() {
        assert!(Timestamper::parse(TimeZone::Utc, "%Y-%Q").is_err());
        assert!(Timestamper::parse(TimeZone::Utc, DEFAULT_CONSOLE_FORMAT).is_ok());
    }

    #[test]
    fn bad_pattern_never_panics() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let stamper = Timestamper::new(TimeZone::Utc, "%Y-%Q");
        assert_eq!(stamper.format(&instant), "2024-03-01T12:00:00+00:00");
    }
}
