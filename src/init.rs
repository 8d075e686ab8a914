use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::console::{ConsoleLayer, DisplayConfig};
use crate::env::config_from_env;
use crate::error::InitError;
use crate::layer::{Dispatcher, LayerStats, SinkLayer};
use crate::level::Level;
use crate::record::mark_start;

/// Configuration of the installed layers.
///
/// **Fields**
/// - `min_level`: events below this level are neither shipped nor printed.
/// - `console`: when `Some`, a [`ConsoleLayer`] with this display
///   configuration prints every event to stderr next to the sink layer.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub console: Option<DisplayConfig>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::NOTSET,
            console: Some(DisplayConfig::default()),
        }
    }
}

/// Install a global `tracing` subscriber made of a [`SinkLayer`] around
/// `dispatcher` and, optionally, a [`ConsoleLayer`].
///
/// **Returns**
/// - The [`LayerStats`] of the sink layer.
/// - `Err(..)` if a global subscriber was already installed.
pub fn init_tracing_with_config(dispatcher: Dispatcher, config: LayerConfig) -> Result<LayerStats, InitError> {
    mark_start();

    let sink_layer = SinkLayer::new(dispatcher.with_min_level(config.min_level));
    let stats = sink_layer.stats();
    let console_layer = config
        .console
        .map(|display| ConsoleLayer::new(display).with_min_level(config.min_level));

    let subscriber = Registry::default().with(sink_layer).with(console_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(stats)
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(dispatcher: Dispatcher) -> Result<LayerStats, InitError> {
    init_tracing_with_config(dispatcher, LayerConfig::default())
}

/// Build the dispatcher from the `LOG_SINK_*` environment variables (see
/// [`crate::env`]) and install it with `config`.
pub fn init_from_env(config: LayerConfig) -> Result<LayerStats, InitError> {
    let dispatcher = Dispatcher::from_config(&config_from_env()?)?;
    init_tracing_with_config(dispatcher, config)
}
