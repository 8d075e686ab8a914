use tracing::{error, info};
use envelope_log_sink::{
    backend::{make_sink_from_config, parse_dsn},
    envelope::Normalizer,
    init::init_tracing,
    layer::Dispatcher,
    sink::DeliveryBackend,
};

fn main() {
    // Example DSN: kafka://broker1:9092,broker2:9092/logs?mode=buffered&linger_ms=50
    let dsn = std::env::var("LOG_SINK_DSN")
        .unwrap_or_else(|_| "kafka://localhost:9092/logs?mode=sync&flush_timeout_ms=2000".to_string());

    let config = parse_dsn(&dsn).expect("invalid LOG_SINK_DSN");
    let sink = make_sink_from_config(&config).expect("failed to build kafka backend sink");
    let normalizer = Normalizer::new(config.tags.clone(), config.time.clone());

    init_tracing(Dispatcher::new(sink.clone(), normalizer)).expect("failed to install subscriber");

    info!("kafka backend example started");
    error!(topic = "logs", "simulated error sent via Kafka backend");

    // buffered mode only hands records to the producer; drain before exit
    if let Err(e) = sink.shutdown() {
        eprintln!("failed to drain {}: {}", sink.target(), e);
    }
}
