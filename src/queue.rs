use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::bridge::Bridge;
use crate::envelope::Envelope;
use crate::error::DeliveryError;
use crate::sink::DeliveryBackend;
use crate::transport::{AsyncQueueClient, QueueProducer};

/// How long [`QueueSink::shutdown`] waits for a buffered producer to drain.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery discipline of a [`QueueSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Flush after every send, waiting at most `flush_timeout`.
    Sync { flush_timeout: Duration },
    /// Hand the payload to the producer buffer and return.
    Buffered,
}

/// Queue sink over a blocking [`QueueProducer`].
///
/// In [`QueueMode::Sync`] each call returns only once the broker has
/// acknowledged the flush (or the timeout elapsed). In
/// [`QueueMode::Buffered`] the producer batches on its own linger
/// schedule; envelopes still buffered when the process dies are lost
/// unless [`DeliveryBackend::shutdown`] drained them.
pub struct QueueSink {
    producer: Arc<dyn QueueProducer>,
    topic: String,
    target: String,
    mode: QueueMode,
}

impl QueueSink {
    pub fn new(producer: Arc<dyn QueueProducer>, address: &str, topic: impl Into<String>, mode: QueueMode) -> Self {
        let topic = topic.into();
        QueueSink {
            target: format!("{}/{}", address, topic),
            producer,
            topic,
            mode,
        }
    }

    pub fn mode(&self) -> QueueMode {
        self.mode
    }
}

impl DeliveryBackend for QueueSink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let payload = envelope.to_json_bytes()?;
        self.producer.send(&self.topic, &payload)?;
        match self.mode {
            QueueMode::Sync { flush_timeout } => self.producer.flush(flush_timeout),
            QueueMode::Buffered => Ok(()),
        }
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn shutdown(&self) -> Result<(), DeliveryError> {
        match self.mode {
            QueueMode::Buffered => self.producer.flush(DRAIN_TIMEOUT),
            QueueMode::Sync { .. } => Ok(()),
        }
    }
}

/// Queue sink over an [`AsyncQueueClient`].
///
/// The client is started lazily by the first delivery; concurrent first
/// deliveries wait on the same start. Every call blocks until the broker
/// acknowledged the message, the exchange itself runs on a private
/// runtime.
pub struct AsyncQueueSink {
    shared: Arc<Shared>,
    target: String,
    bridge: Bridge,
}

struct Shared {
    client: Arc<dyn AsyncQueueClient>,
    started: OnceCell<()>,
    topic: String,
}

impl AsyncQueueSink {
    pub fn new(client: Arc<dyn AsyncQueueClient>, address: &str, topic: impl Into<String>) -> std::io::Result<Self> {
        let topic = topic.into();
        Ok(AsyncQueueSink {
            target: format!("{}/{}", address, topic),
            shared: Arc::new(Shared {
                client,
                started: OnceCell::new(),
                topic,
            }),
            bridge: Bridge::new("log-sink-queue")?,
        })
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.initialized()
    }
}

impl DeliveryBackend for AsyncQueueSink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let payload = envelope.to_json_bytes()?;
        let shared = Arc::clone(&self.shared);
        self.bridge.run(async move {
            shared
                .started
                .get_or_try_init(|| async {
                    shared.client.start().await?;
                    tracing::debug!(topic = %shared.topic, "queue client started");
                    Ok::<(), DeliveryError>(())
                })
                .await?;
            shared.client.send_and_wait(&shared.topic, payload).await
        })
    }

    fn target(&self) -> &str {
        &self.target
    }
}
