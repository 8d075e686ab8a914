use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::level::Level;

/// Instant the logging machinery was first touched; `relative_created`
/// is measured from here.
static START: Lazy<Instant> = Lazy::new(Instant::now);

static PROCESS_NAME: Lazy<String> = Lazy::new(|| {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "main".to_string())
});

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Pin the reference instant used for `relative_created`.
pub fn mark_start() {
    Lazy::force(&START);
}

/// Value of an extra attribute attached to a [`LogEvent`].
///
/// `Other` holds the textual form of a value that has no structured
/// representation, which is what `tracing` hands over for `?value` and
/// `%value` fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Other(String),
}

impl FieldValue {
    /// Wrap any debuggable value as a non-primitive field.
    pub fn other(value: &dyn fmt::Debug) -> Self {
        FieldValue::Other(format!("{:?}", value))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(v) | FieldValue::Other(v) => f.write_str(v),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            FieldValue::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Name and numeric id of the process or thread that produced an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity<Id> {
    pub name: String,
    pub id: Id,
}

/// Read-only snapshot of a single logging call.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Logger name; the `tracing` target for captured events.
    pub name: String,
    pub level: Level,
    /// Message template with `{}` placeholders.
    pub msg: String,
    pub args: Vec<FieldValue>,
    pub pathname: String,
    pub lineno: u32,
    pub module: String,
    pub func_name: Option<String>,
    pub process: Identity<u32>,
    pub thread: Identity<u64>,
    pub created: DateTime<Utc>,
    /// Time elapsed between [`mark_start`] and the creation of the event.
    pub relative_created: Duration,
    pub exc_text: Option<String>,
    pub stack_info: Option<String>,
    pub extra: BTreeMap<String, FieldValue>,
}

impl LogEvent {
    /// Start a new event stamped with the current time, process and thread.
    pub fn new(name: impl Into<String>, level: Level, msg: impl Into<String>) -> Self {
        let current = std::thread::current();
        let thread_name = current.name().unwrap_or("unnamed").to_string();

        LogEvent {
            name: name.into(),
            level,
            msg: msg.into(),
            args: Vec::new(),
            pathname: String::new(),
            lineno: 0,
            module: String::new(),
            func_name: None,
            process: Identity {
                name: PROCESS_NAME.clone(),
                id: std::process::id(),
            },
            thread: Identity {
                name: thread_name,
                id: THREAD_ID.with(|id| *id),
            },
            created: Utc::now(),
            relative_created: START.elapsed(),
            exc_text: None,
            stack_info: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_location(mut self, pathname: impl Into<String>, lineno: u32, module: impl Into<String>) -> Self {
        self.pathname = pathname.into();
        self.lineno = lineno;
        self.module = module.into();
        self
    }

    pub fn with_function(mut self, func_name: impl Into<String>) -> Self {
        self.func_name = Some(func_name.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exc_text: impl Into<String>) -> Self {
        self.exc_text = Some(exc_text.into());
        self
    }

    pub fn with_stack(mut self, stack_info: impl Into<String>) -> Self {
        self.stack_info = Some(stack_info.into());
        self
    }

    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Last path component of `pathname`.
    pub fn filename(&self) -> &str {
        self.pathname
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.pathname)
    }

    /// Render the message template with the positional arguments.
    ///
    /// `{}` is replaced by the next argument, `{{` and `}}` produce literal
    /// braces. Placeholders without a matching argument are kept verbatim;
    /// surplus arguments are ignored.
    pub fn message(&self) -> String {
        if self.args.is_empty() {
            return self.msg.clone();
        }

        let mut out = String::with_capacity(self.msg.len());
        let mut args = self.args.iter();
        let mut chars = self.msg.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    chars.next();
                    out.push(c);
                }
                ('{', Some('}')) => {
                    chars.next();
                    match args.next() {
                        Some(arg) => out.push_str(&arg.to_string()),
                        None => out.push_str("{}"),
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_fills_placeholders() {
        let event = LogEvent::new("app", Level::INFO, "user {} logged in after {} tries")
            .with_args(vec![FieldValue::from("bob"), FieldValue::from(3)]);
        assert_eq!(event.message(), "user bob logged in after 3 tries");
    }

    #[test]
    fn message_keeps_escapes_and_missing_args() {
        let event = LogEvent::new("app", Level::INFO, "{{literal}} {} {}").with_args(vec![1]);
        assert_eq!(event.message(), "{literal} 1 {}");
    }

    #[test]
    fn message_without_args_is_verbatim() {
        let event = LogEvent::new("app", Level::INFO, "raw {} {{");
        assert_eq!(event.message(), "raw {} {{");
    }

    #[test]
    fn filename_handles_both_separators() {
        let event = LogEvent::new("app", Level::INFO, "m").with_location("src/a/b.rs", 1, "a::b");
        assert_eq!(event.filename(), "b.rs");
        let event = LogEvent::new("app", Level::INFO, "m").with_location(r"src\a\c.rs", 1, "a::c");
        assert_eq!(event.filename(), "c.rs");
    }

    #[test]
    fn captures_thread_identity() {
        let event = std::thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(|| LogEvent::new("app", Level::INFO, "m"))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(event.thread.name, "worker-7");
        assert_eq!(event.process.id, std::process::id());
    }

    #[test]
    fn display_of_nested_values() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), FieldValue::from(vec![1, 2]));
        assert_eq!(FieldValue::Map(map).to_string(), "{k: [1, 2]}");
    }
}
