//! Environment variable names used by this crate for convenient
//! configuration of sinks from services.
//!
//! These are purely helpers; the sink types themselves never read the
//! environment.

use serde_json::{Map, Value};

use crate::backend::{parse_dsn, BackendConfig};
use crate::clock::{TimeZone, Timestamper, DEFAULT_DELIVERY_FORMAT};
use crate::envelope::EnvelopeTags;
use crate::error::InitError;

/// Backend DSN, e.g. `http://127.0.0.1:5044` or
/// `kafka://broker:9092/logs?mode=sync&flush_timeout_ms=2000`.
pub const LOG_SINK_DSN_ENV: &str = "LOG_SINK_DSN";

/// Optional application name tag.
pub const LOG_SINK_APP_NAME_ENV: &str = "LOG_SINK_APP_NAME";

/// Optional host name tag; `auto` resolves the machine's host name.
pub const LOG_SINK_HOST_NAME_ENV: &str = "LOG_SINK_HOST_NAME";

/// Optional static extra data, as a JSON object.
pub const LOG_SINK_EXTRA_DATA_ENV: &str = "LOG_SINK_EXTRA_DATA";

/// Zone of the envelope `time` field: `UTC`, `local`, `+HH:MM` or an IANA
/// name such as `Asia/Tehran`.
pub const LOG_SINK_TIMEZONE_ENV: &str = "LOG_SINK_TIMEZONE";

/// strftime format of the envelope `time` field.
pub const LOG_SINK_TIME_FORMAT_ENV: &str = "LOG_SINK_TIME_FORMAT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the machine's host name.
pub fn system_host_name() -> Option<String> {
    hostname::get().ok().map(|h| h.to_string_lossy().into_owned())
}

/// Build a [`BackendConfig`] from the `LOG_SINK_*` variables.
///
/// A missing or empty DSN yields [`BackendConfig::unbound`] so the
/// dispatcher silently does nothing.
pub fn config_from_env() -> Result<BackendConfig, InitError> {
    let mut config = match non_empty(LOG_SINK_DSN_ENV) {
        Some(dsn) => parse_dsn(&dsn)?,
        None => BackendConfig::unbound(),
    };

    let mut tags = EnvelopeTags::default();
    if let Some(app_name) = non_empty(LOG_SINK_APP_NAME_ENV) {
        tags = tags.with_app_name(app_name);
    }
    match non_empty(LOG_SINK_HOST_NAME_ENV).as_deref() {
        Some("auto") => tags.host_name = system_host_name(),
        Some(host) => tags = tags.with_host_name(host),
        None => {}
    }
    if let Some(raw) = non_empty(LOG_SINK_EXTRA_DATA_ENV) {
        tags = tags.with_extra_data(parse_extra_data(&raw)?);
    }
    config.tags = tags;

    let zone = env_or(LOG_SINK_TIMEZONE_ENV, "UTC")
        .parse::<TimeZone>()
        .map_err(|message| InitError::Env { key: LOG_SINK_TIMEZONE_ENV, message })?;
    config.time = Timestamper::parse(zone, env_or(LOG_SINK_TIME_FORMAT_ENV, DEFAULT_DELIVERY_FORMAT))
        .map_err(|message| InitError::Env { key: LOG_SINK_TIME_FORMAT_ENV, message })?;

    Ok(config)
}

fn parse_extra_data(raw: &str) -> Result<Map<String, Value>, InitError> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(InitError::Env {
            key: LOG_SINK_EXTRA_DATA_ENV,
            message: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(InitError::Env {
            key: LOG_SINK_EXTRA_DATA_ENV,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    // Every variable is touched by this single test so that parallel tests
    // never race on the process environment.
    #[test]
    fn reads_config_from_env() {
        for key in [
            LOG_SINK_DSN_ENV,
            LOG_SINK_APP_NAME_ENV,
            LOG_SINK_HOST_NAME_ENV,
            LOG_SINK_EXTRA_DATA_ENV,
            LOG_SINK_TIMEZONE_ENV,
            LOG_SINK_TIME_FORMAT_ENV,
        ] {
            std::env::remove_var(key);
        }

        let config = config_from_env().unwrap();
        assert!(!config.is_bound());
        assert_eq!(config.tags, EnvelopeTags::default());

        std::env::set_var(LOG_SINK_DSN_ENV, "kafka://b1:9092/logs?mode=async");
        std::env::set_var(LOG_SINK_APP_NAME_ENV, "orders");
        std::env::set_var(LOG_SINK_HOST_NAME_ENV, "node-3");
        std::env::set_var(LOG_SINK_EXTRA_DATA_ENV, r#"{"env":"staging"}"#);
        std::env::set_var(LOG_SINK_TIMEZONE_ENV, "+03:30");

        let config = config_from_env().unwrap();
        assert_eq!(config.kind, BackendKind::KafkaNonBlocking);
        assert_eq!(config.tags.app_name.as_deref(), Some("orders"));
        assert_eq!(config.tags.host_name.as_deref(), Some("node-3"));
        assert_eq!(config.tags.extra_data.as_ref().unwrap()["env"], "staging");
        assert!(matches!(config.time.zone, TimeZone::Fixed(_)));
        assert_eq!(config.time.format, DEFAULT_DELIVERY_FORMAT);

        std::env::set_var(LOG_SINK_EXTRA_DATA_ENV, "[1, 2]");
        assert!(matches!(
            config_from_env(),
            Err(InitError::Env { key: LOG_SINK_EXTRA_DATA_ENV, .. })
        ));

        std::env::set_var(LOG_SINK_EXTRA_DATA_ENV, "{}");
        std::env::set_var(LOG_SINK_TIMEZONE_ENV, "Asia/Tehran");
        std::env::set_var(LOG_SINK_TIME_FORMAT_ENV, "%Y-%Q");
        assert!(matches!(config_from_env(), Err(InitError::Env { key: LOG_SINK_TIME_FORMAT_ENV, .. })));

        std::env::remove_var(LOG_SINK_TIME_FORMAT_ENV);
        assert!(matches!(config_from_env().unwrap().time.zone, TimeZone::Named(_)));

        std::env::set_var(LOG_SINK_TIMEZONE_ENV, "Mars/Olympus");
        assert!(matches!(config_from_env(), Err(InitError::Env { key: LOG_SINK_TIMEZONE_ENV, .. })));

        for key in [
            LOG_SINK_DSN_ENV,
            LOG_SINK_APP_NAME_ENV,
            LOG_SINK_HOST_NAME_ENV,
            LOG_SINK_EXTRA_DATA_ENV,
            LOG_SINK_TIMEZONE_ENV,
        ] {
            std::env::remove_var(key);
        }
    }
}
