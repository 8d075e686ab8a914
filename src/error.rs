use std::error::Error;

/// Boxed error produced by a transport client library.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failure of a single delivery attempt. Reported, never retried.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("collector rejected envelope with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("queue client has not been started")]
    NotStarted,

    #[error("delivery runtime stopped before the transport answered")]
    BridgeClosed,
}

impl DeliveryError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        DeliveryError::Transport(err.into())
    }
}

/// The only error that may leave [`Dispatcher::on_event`].
///
/// [`Dispatcher::on_event`]: crate::layer::Dispatcher::on_event
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Dispatch was re-entered from inside a delivery or failure report on
    /// the same thread, or from a delivery runtime thread.
    #[error("log dispatch re-entered while a delivery was in progress")]
    RecursiveFailure,
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("queue DSN is missing a topic")]
    MissingTopic,

    #[error("synchronous queue mode requires flush_timeout_ms")]
    MissingFlushTimeout,

    #[error("unknown queue mode: {0}")]
    InvalidMode(String),

    #[error("invalid value for {key}: {value}")]
    InvalidParam { key: String, value: String },
}

/// Error type returned when building a backend sink from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("{0} feature is not enabled")]
    FeatureDisabled(&'static str),

    #[error("backend has no address or topic bound")]
    Unbound,

    #[error("failed to start delivery runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to create transport client: {0}")]
    Client(#[source] BoxError),
}

/// Error type returned by the `init` helpers.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Dsn(#[from] DsnError),

    #[error("invalid {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error(transparent)]
    Backend(#[from] BackendBuildError),

    #[error(transparent)]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}
