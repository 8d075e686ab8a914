use std::sync::Arc;

use crate::bridge::Bridge;
use crate::envelope::Envelope;
use crate::error::DeliveryError;
use crate::sink::DeliveryBackend;
use crate::transport::HttpClient;

/// HTTP sink that POSTs every envelope as one JSON document.
///
/// There is no batching: the calling thread blocks for the full round
/// trip of each request.
pub struct HttpSink {
    shared: Arc<Shared>,
    bridge: Bridge,
}

struct Shared {
    client: Arc<dyn HttpClient>,
    url: String,
    headers: Vec<(String, String)>,
}

impl HttpSink {
    /// Create a sink posting to `url` through `client`.
    ///
    /// **Parameters**
    /// - `url`: collector endpoint, e.g. "http://127.0.0.1:5044".
    /// - `client`: any [`HttpClient`]; see `ReqwestClient` for the default.
    ///
    /// **Returns**
    /// - The sink, or the I/O error raised while starting its runtime.
    pub fn new(url: impl Into<String>, client: Arc<dyn HttpClient>) -> std::io::Result<Self> {
        Ok(HttpSink {
            shared: Arc::new(Shared {
                client,
                url: url.into(),
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            }),
            bridge: Bridge::new("log-sink-http")?,
        })
    }

    /// Create a sink using the `reqwest` client.
    #[cfg(feature = "http")]
    pub fn with_reqwest(url: impl Into<String>) -> std::io::Result<Self> {
        Self::new(url, Arc::new(crate::transport::ReqwestClient::new()))
    }
}

impl DeliveryBackend for HttpSink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let body = envelope.to_json_bytes()?;
        let shared = Arc::clone(&self.shared);
        self.bridge
            .run(async move { shared.client.post(&shared.url, body, &shared.headers).await })
    }

    fn target(&self) -> &str {
        &self.shared.url
    }
}
