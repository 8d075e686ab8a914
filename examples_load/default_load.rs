use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use envelope_log_sink::envelope::{Envelope, Normalizer};
use envelope_log_sink::error::DeliveryError;
use envelope_log_sink::init::{init_tracing_with_config, LayerConfig};
use envelope_log_sink::layer::Dispatcher;
use envelope_log_sink::sink::DeliveryBackend;

/// Serializes every envelope and counts the bytes, so the measurement
/// covers capture, normalization and encoding but no network.
#[derive(Default)]
struct CountingSink {
    bytes: AtomicU64,
}

impl DeliveryBackend for CountingSink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let body = envelope.to_json_bytes()?;
        self.bytes.fetch_add(body.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn target(&self) -> &str {
        "counting"
    }
}

fn main() {
    let sink = Arc::new(CountingSink::default());
    let dispatcher = Dispatcher::new(sink.clone(), Normalizer::default());
    let stats = init_tracing_with_config(dispatcher, LayerConfig { console: None, ..Default::default() })
        .expect("failed to install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, retries = 3, "default load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "dispatched {} of {} events in {:?} (~{:.0} ev/s, {} bytes encoded)",
        stats.dispatched(),
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        sink.bytes.load(Ordering::Relaxed)
    );
}
