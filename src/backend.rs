use std::sync::Arc;
use std::time::Duration;

use crate::clock::Timestamper;
use crate::envelope::EnvelopeTags;
use crate::error::{BackendBuildError, DsnError};
use crate::sink::DeliveryBackend;

/// Supported backend kinds, each carrying its own tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// One blocking JSON POST per envelope.
    Http,
    /// Kafka send followed by a flush bounded by `flush_timeout`.
    KafkaSync { flush_timeout: Duration },
    /// Kafka send into the producer buffer; `linger` overrides `linger.ms`.
    KafkaBuffered { linger: Option<Duration> },
    /// Lazily connected Kafka producer awaiting each acknowledgment.
    KafkaNonBlocking,
}

impl BackendKind {
    pub fn is_queue(&self) -> bool {
        !matches!(self, BackendKind::Http)
    }
}

/// Backend configuration built from a DSN or explicit fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Selected backend implementation.
    pub kind: BackendKind,
    /// Collector URL for HTTP, comma-separated broker list for Kafka.
    pub address: String,
    /// Kafka topic; unused for HTTP.
    pub topic: String,
    pub tags: EnvelopeTags,
    /// Format of the envelope `time` field.
    pub time: Timestamper,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, address: impl Into<String>) -> Self {
        BackendConfig {
            kind,
            address: address.into(),
            topic: String::new(),
            tags: EnvelopeTags::default(),
            time: Timestamper::default(),
        }
    }

    /// Configuration with nothing bound; dispatchers built from it do nothing.
    pub fn unbound() -> Self {
        BackendConfig::new(BackendKind::Http, "")
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_tags(mut self, tags: EnvelopeTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_time(mut self, time: Timestamper) -> Self {
        self.time = time;
        self
    }

    /// `true` when an address (and, for queues, a topic) is bound.
    pub fn is_bound(&self) -> bool {
        !self.address.trim().is_empty() && (!self.kind.is_queue() || !self.topic.trim().is_empty())
    }
}

/// Parse a DSN string and infer the backend from its scheme.
///
/// Examples:
/// - "http://127.0.0.1:5044" (any `http`/`https` URL is posted to as-is)
/// - "kafka://broker1,broker2/logs?mode=sync&flush_timeout_ms=2000"
/// - "kafka://broker1/logs?mode=buffered&linger_ms=5"
/// - "kafka://broker1/logs?mode=async"
///
/// `mode` defaults to `sync`, which requires `flush_timeout_ms`.
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let dsn = dsn.trim();
    let lower = dsn.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(BackendConfig::new(BackendKind::Http, dsn))
    } else if lower.starts_with("kafka://") {
        parse_kafka(&dsn["kafka://".len()..])
    } else {
        Err(DsnError::UnknownScheme)
    }
}

fn parse_kafka(rest: &str) -> Result<BackendConfig, DsnError> {
    let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
    let (brokers, topic) = location.split_once('/').unwrap_or((location, ""));
    let topic = topic.trim_end_matches('/');
    if topic.is_empty() {
        return Err(DsnError::MissingTopic);
    }

    let mut mode = "sync".to_string();
    let mut flush_timeout = None;
    let mut linger = None;

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let invalid = || DsnError::InvalidParam {
            key: key.to_string(),
            value: raw.to_string(),
        };
        let value = urlencoding::decode(raw).map_err(|_| invalid())?;
        match key {
            "mode" => mode = value.to_ascii_lowercase(),
            "flush_timeout_ms" => flush_timeout = Some(parse_millis(&value).ok_or_else(invalid)?),
            "linger_ms" => linger = Some(parse_millis(&value).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        }
    }

    let kind = match mode.as_str() {
        "sync" => BackendKind::KafkaSync {
            flush_timeout: flush_timeout.ok_or(DsnError::MissingFlushTimeout)?,
        },
        "buffered" => BackendKind::KafkaBuffered { linger },
        "async" | "nonblocking" => BackendKind::KafkaNonBlocking,
        other => return Err(DsnError::InvalidMode(other.to_string())),
    };

    Ok(BackendConfig::new(kind, brokers).with_topic(topic))
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}

/// Create the concrete [`DeliveryBackend`] described by `cfg`.
///
/// This is the main entry point for applications that select a backend
/// with a single DSN string instead of constructing sinks manually.
pub fn make_sink_from_config(cfg: &BackendConfig) -> Result<Arc<dyn DeliveryBackend>, BackendBuildError> {
    if !cfg.is_bound() {
        return Err(BackendBuildError::Unbound);
    }

    let sink: Arc<dyn DeliveryBackend> = match cfg.kind {
        BackendKind::Http => {
            #[cfg(feature = "http")]
            {
                Arc::new(crate::http::HttpSink::with_reqwest(cfg.address.clone())?) as Arc<dyn DeliveryBackend>
            }

            #[cfg(not(feature = "http"))]
            {
                return Err(BackendBuildError::FeatureDisabled("http"));
            }
        }
        kind => {
            #[cfg(feature = "kafka")]
            {
                make_kafka_sink(cfg, kind)?
            }

            #[cfg(not(feature = "kafka"))]
            {
                let _ = kind;
                return Err(BackendBuildError::FeatureDisabled("kafka"));
            }
        }
    };

    tracing::debug!(kind = ?cfg.kind, sink = sink.target(), "log sink backend configured");
    Ok(sink)
}

#[cfg(feature = "kafka")]
fn make_kafka_sink(cfg: &BackendConfig, kind: BackendKind) -> Result<Arc<dyn DeliveryBackend>, BackendBuildError> {
    use crate::kafka::{KafkaAsyncClient, KafkaProducer};
    use crate::queue::{AsyncQueueSink, QueueMode, QueueSink};

    let (linger, mode) = match kind {
        BackendKind::KafkaSync { flush_timeout } => (None, QueueMode::Sync { flush_timeout }),
        BackendKind::KafkaBuffered { linger } => (linger, QueueMode::Buffered),
        BackendKind::KafkaNonBlocking | BackendKind::Http => {
            let client = Arc::new(KafkaAsyncClient::new(&cfg.address));
            return Ok(Arc::new(AsyncQueueSink::new(client, &cfg.address, cfg.topic.clone())?));
        }
    };

    let producer = KafkaProducer::new(&cfg.address, linger).map_err(|e| BackendBuildError::Client(e.into()))?;
    Ok(Arc::new(QueueSink::new(Arc::new(producer), &cfg.address, cfg.topic.clone(), mode)))
}
