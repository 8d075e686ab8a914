pub mod compose;
pub mod level;
pub mod record;
pub mod clock;
pub mod envelope;
pub mod console;
pub mod error;
pub mod sink;
pub mod transport;
pub mod http;
pub mod queue;

#[cfg(feature = "kafka")]
pub mod kafka;

pub mod diagnostics;
pub mod layer;
pub mod backend;
pub mod env;
pub mod init;

mod bridge;
