use std::sync::Arc;

use tracing::{error, info};
use envelope_log_sink::{
    envelope::{Envelope, EnvelopeTags, Normalizer},
    error::DeliveryError,
    init::init_tracing,
    layer::Dispatcher,
    sink::DeliveryBackend,
};

/// Example of integrating a completely custom backend by implementing
/// the `DeliveryBackend` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide a built-in
/// sink.
struct MyCustomDbSink;

impl DeliveryBackend for MyCustomDbSink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        // Here you would call your own client library for the target store.
        let body = envelope.to_json_bytes()?;
        println!("[my-custom-db] {}", String::from_utf8_lossy(&body));
        Ok(())
    }

    fn target(&self) -> &str {
        "my-custom-db"
    }
}

fn main() {
    let tags = EnvelopeTags::default().with_app_name("custom-example").with_host_name("local");
    let dispatcher = Dispatcher::new(Arc::new(MyCustomDbSink), Normalizer::new(tags, Default::default()));

    init_tracing(dispatcher).expect("failed to install subscriber");

    info!("custom backend example started");
    error!(db = "my-custom-db", "simulated error sent via custom backend");
}
