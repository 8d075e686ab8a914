//! Capability contracts the sinks need from transport client libraries.
//!
//! Sinks only ever talk to these traits, so a test double or an
//! alternative client library can be plugged in without touching them.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::DeliveryError;

/// Minimal asynchronous HTTP client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST `body` to `url` with the given headers.
    ///
    /// Non-success statuses must be returned as
    /// [`DeliveryError::Rejected`].
    async fn post(&self, url: &str, body: Vec<u8>, headers: &[(String, String)]) -> Result<(), DeliveryError>;
}

/// Blocking message-queue producer with an internal send buffer.
pub trait QueueProducer: Send + Sync {
    /// Enqueue `payload` for `topic` without waiting for the broker.
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), DeliveryError>;

    /// Block until the buffer is transmitted or `timeout` elapses.
    fn flush(&self, timeout: Duration) -> Result<(), DeliveryError>;
}

/// Asynchronous message-queue client that acknowledges each message.
#[async_trait]
pub trait AsyncQueueClient: Send + Sync {
    /// Establish the connection. Called exactly once per sink.
    async fn start(&self) -> Result<(), DeliveryError>;

    /// Send `payload` and resolve once the broker acknowledged it.
    async fn send_and_wait(&self, topic: &str, payload: Vec<u8>) -> Result<(), DeliveryError>;
}

#[cfg(feature = "http")]
pub use reqwest_client::ReqwestClient;

#[cfg(feature = "http")]
mod reqwest_client {
    use super::HttpClient;
    use crate::error::DeliveryError;
    use async_trait::async_trait;
    use reqwest::Client;

    /// [`HttpClient`] backed by `reqwest`.
    #[derive(Clone, Default)]
    pub struct ReqwestClient {
        client: Client,
    }

    impl ReqwestClient {
        pub fn new() -> Self {
            Self { client: Client::new() }
        }

        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn post(&self, url: &str, body: Vec<u8>, headers: &[(String, String)]) -> Result<(), DeliveryError> {
            let mut request = self.client.post(url).body(body);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let resp = request.send().await.map_err(DeliveryError::transport)?;
            if resp.status().is_success() {
                Ok(())
            } else {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
                Err(DeliveryError::Rejected { status, body })
            }
        }
    }
}
