use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::clock::Timestamper;
use crate::record::{FieldValue, LogEvent};

/// Keys a caller-supplied extra attribute may never occupy.
pub static RESERVED_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // standard fields
        "name",
        "levelname",
        "levelno",
        "pathname",
        "filename",
        "module",
        "lineno",
        "funcName",
        "created",
        "msecs",
        "relativeCreated",
        "thread",
        "threadName",
        "processName",
        "process",
        // event internals
        "msg",
        "args",
        "message",
        "exc_info",
        "exc_text",
        "stack_info",
        // envelope keys
        "logger_data",
        "extra_data",
        "short_message",
        "app_name",
        "host_name",
        "time",
    ]
    .into_iter()
    .collect()
});

/// Optional tags stamped on every envelope of a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeTags {
    pub app_name: Option<String>,
    pub host_name: Option<String>,
    pub extra_data: Option<Map<String, Value>>,
}

impl EnvelopeTags {
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_extra_data(mut self, extra_data: Map<String, Value>) -> Self {
        self.extra_data = Some(extra_data);
        self
    }
}

/// Standard fields copied from the event, serialized under `logger_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggerData {
    pub name: String,
    #[serde(rename = "levelname")]
    pub level_name: String,
    #[serde(rename = "levelno")]
    pub level_no: u8,
    pub pathname: String,
    pub filename: String,
    pub module: String,
    pub lineno: u32,
    #[serde(rename = "funcName")]
    pub func_name: Option<String>,
    /// Seconds since the Unix epoch.
    pub created: f64,
    /// Millisecond portion of `created`.
    pub msecs: f64,
    /// Milliseconds since the logging machinery started.
    #[serde(rename = "relativeCreated")]
    pub relative_created: f64,
    pub thread: u64,
    #[serde(rename = "threadName")]
    pub thread_name: String,
    #[serde(rename = "processName")]
    pub process_name: String,
    pub process: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exc_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_info: Option<String>,
}

/// Transport-ready representation of one [`LogEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub logger_data: LoggerData,
    pub short_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Map<String, Value>>,
    pub time: String,
    /// Promoted extra attributes; never contains a reserved key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Envelope {
    /// UTF-8 JSON body as shipped to collectors and brokers.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Convert a field value to a transport-safe JSON value.
///
/// Primitives, lists and maps pass through; anything else becomes its
/// string form. Non-finite floats have no JSON form and become `null`.
pub fn coerce(value: &FieldValue) -> Value {
    match value {
        FieldValue::Bool(v) => Value::Bool(*v),
        FieldValue::Int(v) => Value::from(*v),
        FieldValue::UInt(v) => Value::from(*v),
        FieldValue::Float(v) => Value::from(*v),
        FieldValue::Str(v) => Value::String(v.clone()),
        FieldValue::List(items) => Value::Array(items.iter().map(coerce).collect()),
        FieldValue::Map(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), coerce(v))).collect()),
        FieldValue::Other(repr) => Value::String(repr.clone()),
    }
}

fn logger_data(event: &LogEvent) -> LoggerData {
    let created_ms = event.created.timestamp_millis();
    LoggerData {
        name: event.name.clone(),
        level_name: event.level.name(),
        level_no: event.level.number(),
        pathname: event.pathname.clone(),
        filename: event.filename().to_string(),
        module: event.module.clone(),
        lineno: event.lineno,
        func_name: event.func_name.clone(),
        created: created_ms as f64 / 1000.0,
        msecs: created_ms.rem_euclid(1000) as f64,
        relative_created: event.relative_created.as_secs_f64() * 1000.0,
        thread: event.thread.id,
        thread_name: event.thread.name.clone(),
        process_name: event.process.name.clone(),
        process: event.process.id,
        exc_text: event.exc_text.clone(),
        stack_info: event.stack_info.clone(),
    }
}

/// Build the envelope for `event`.
///
/// **Parameters**
/// - `event`: the event to normalize; it is only read.
/// - `tags`: configured tags; unset tags are omitted from the envelope.
/// - `time`: delivery timestamp string placed in the `time` key.
pub fn normalize(event: &LogEvent, tags: &EnvelopeTags, time: String) -> Envelope {
    let extra = event
        .extra
        .iter()
        .filter(|(key, _)| !RESERVED_FIELDS.contains(key.as_str()))
        .map(|(key, value)| (key.clone(), coerce(value)))
        .collect();

    Envelope {
        logger_data: logger_data(event),
        short_message: event.message(),
        app_name: tags.app_name.clone(),
        host_name: tags.host_name.clone(),
        extra_data: tags.extra_data.clone(),
        time,
        extra,
    }
}

/// Tags plus delivery-time formatting, bound once per backend.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    pub tags: EnvelopeTags,
    pub time: Timestamper,
}

impl Normalizer {
    pub fn new(tags: EnvelopeTags, time: Timestamper) -> Self {
        Normalizer { tags, time }
    }

    /// Normalize `event`, stamping `time` with the current instant.
    pub fn normalize(&self, event: &LogEvent) -> Envelope {
        normalize(event, &self.tags, self.time.now())
    }
}
