use tracing::{error, info};
use envelope_log_sink::{
    backend::parse_dsn,
    envelope::EnvelopeTags,
    init::init_tracing,
    layer::Dispatcher,
};

fn main() {
    // Example DSN: http://localhost:8080/logs
    let dsn = std::env::var("LOG_SINK_DSN").unwrap_or_else(|_| "http://localhost:8080/logs".to_string());

    let config = parse_dsn(&dsn)
        .expect("invalid LOG_SINK_DSN")
        .with_tags(EnvelopeTags::default().with_app_name("http-example"));
    let dispatcher = Dispatcher::from_config(&config).expect("failed to build http backend sink");

    init_tracing(dispatcher).expect("failed to install subscriber");

    info!("http backend example started");
    error!(retries = 3, user = "u-42", "simulated error sent via HTTP backend");
}
