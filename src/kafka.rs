use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{
    BaseRecord, DefaultProducerContext, FutureProducer, FutureRecord, Producer, ThreadedProducer,
};
use rdkafka::util::Timeout;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::DeliveryError;
use crate::transport::{AsyncQueueClient, QueueProducer};

/// Longest a send may wait for room in librdkafka's local queue.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(brokers: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", brokers);
    config
}

/// Kafka [`QueueProducer`] backed by a `ThreadedProducer`, whose
/// background thread polls delivery reports and transmits batches.
pub struct KafkaProducer {
    producer: ThreadedProducer<DefaultProducerContext>,
}

impl KafkaProducer {
    /// Create a producer for `brokers` (comma-separated list).
    ///
    /// `linger` sets `linger.ms`, the time librdkafka accumulates messages
    /// before sending a batch; `None` keeps the library default.
    pub fn new(brokers: &str, linger: Option<Duration>) -> Result<Self, DeliveryError> {
        let mut config = client_config(brokers);
        if let Some(linger) = linger {
            config.set("linger.ms", linger.as_millis().to_string());
        }
        let producer = config.create().map_err(DeliveryError::transport)?;
        Ok(KafkaProducer { producer })
    }
}

impl QueueProducer for KafkaProducer {
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        let record: BaseRecord<'_, (), [u8]> = BaseRecord::to(topic).payload(payload);
        self.producer
            .send(record)
            .map_err(|(e, _)| DeliveryError::transport(e))
    }

    fn flush(&self, timeout: Duration) -> Result<(), DeliveryError> {
        self.producer.flush(timeout).map_err(DeliveryError::transport)
    }
}

/// Kafka [`AsyncQueueClient`] backed by a `FutureProducer` created on
/// [`start`](AsyncQueueClient::start).
pub struct KafkaAsyncClient {
    config: ClientConfig,
    producer: OnceLock<FutureProducer>,
    enqueue_timeout: Duration,
}

impl KafkaAsyncClient {
    pub fn new(brokers: &str) -> Self {
        KafkaAsyncClient {
            config: client_config(brokers),
            producer: OnceLock::new(),
            enqueue_timeout: ENQUEUE_TIMEOUT,
        }
    }

    /// Override [`ENQUEUE_TIMEOUT`]. A send that cannot enqueue in time
    /// fails with a transport error instead of blocking the caller.
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    pub fn enqueue_timeout(&self) -> Duration {
        self.enqueue_timeout
    }
}

#[async_trait]
impl AsyncQueueClient for KafkaAsyncClient {
    async fn start(&self) -> Result<(), DeliveryError> {
        let producer: FutureProducer = self.config.create().map_err(DeliveryError::transport)?;
        // A second start keeps the first producer.
        let _ = self.producer.set(producer);
        Ok(())
    }

    async fn send_and_wait(&self, topic: &str, payload: Vec<u8>) -> Result<(), DeliveryError> {
        let producer = self.producer.get().ok_or(DeliveryError::NotStarted)?;
        let record: FutureRecord<'_, (), Vec<u8>> = FutureRecord::to(topic).payload(&payload);
        producer
            .send(record, Timeout::After(self.enqueue_timeout))
            .await
            .map_err(|(e, _)| DeliveryError::transport(e))?;
        Ok(())
    }
}
