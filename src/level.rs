use std::fmt;

/// Numeric severity of a [`LogEvent`](crate::record::LogEvent).
///
/// The well-known levels are exposed as associated constants and are
/// ordered `NOTSET < DEBUG < INFO < WARNING < ERROR < CRITICAL`. Any other
/// number is accepted and treated as an unrecognized level by renderers.
/// `Default` is `NOTSET`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const NOTSET: Level = Level(0);
    pub const DEBUG: Level = Level(10);
    pub const INFO: Level = Level(20);
    pub const WARNING: Level = Level(30);
    pub const ERROR: Level = Level(40);
    pub const CRITICAL: Level = Level(50);

    pub const fn from_number(number: u8) -> Self {
        Level(number)
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    /// Canonical upper-case name, or `Level N` for unrecognized numbers.
    pub fn name(self) -> String {
        match self {
            Level::NOTSET => "NOTSET".to_string(),
            Level::DEBUG => "DEBUG".to_string(),
            Level::INFO => "INFO".to_string(),
            Level::WARNING => "WARNING".to_string(),
            Level::ERROR => "ERROR".to_string(),
            Level::CRITICAL => "CRITICAL".to_string(),
            Level(n) => format!("Level {}", n),
        }
    }

    pub fn is_known(self) -> bool {
        matches!(
            self,
            Level::NOTSET | Level::DEBUG | Level::INFO | Level::WARNING | Level::ERROR | Level::CRITICAL
        )
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<&tracing::Level> for Level {
    // `tracing` has no CRITICAL and its TRACE has no counterpart, so TRACE
    // folds into DEBUG.
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARNING,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOTSET" => Ok(Level::NOTSET),
            "DEBUG" | "TRACE" => Ok(Level::DEBUG),
            "INFO" => Ok(Level::INFO),
            "WARNING" | "WARN" => Ok(Level::WARNING),
            "ERROR" => Ok(Level::ERROR),
            "CRITICAL" | "FATAL" => Ok(Level::CRITICAL),
            other => other
                .parse::<u8>()
                .map(Level)
                .map_err(|_| format!("unknown log level: {}", s)),
        }
    }
}
