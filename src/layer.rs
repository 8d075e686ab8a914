use std::cell::Cell;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::backend::{make_sink_from_config, BackendConfig};
use crate::diagnostics::{Diagnostics, StderrDiagnostics};
use crate::envelope::Normalizer;
use crate::error::{BackendBuildError, DeliveryError, DispatchError};
use crate::level::Level;
use crate::record::{FieldValue, LogEvent};
use crate::sink::DeliveryBackend;

/// Crates whose own log events must not be shipped through the sinks they
/// implement.
const TRANSPORT_TARGETS: &[&str] = &["reqwest", "hyper", "h2", "rustls", "rdkafka"];

thread_local! {
    static DISPATCHING: Cell<bool> = Cell::new(false);
    static DELIVERY_THREAD: Cell<bool> = Cell::new(false);
}

/// Flag the current thread as owned by a delivery runtime; dispatch is
/// refused on it for the rest of its life.
pub(crate) fn mark_delivery_thread() {
    DELIVERY_THREAD.with(|flag| flag.set(true));
}

pub(crate) fn is_delivery_thread() -> bool {
    DELIVERY_THREAD.with(Cell::get)
}

struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Option<Self> {
        if is_delivery_thread() || DISPATCHING.with(|d| d.replace(true)) {
            return None;
        }
        Some(DispatchGuard)
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(false));
    }
}

/// Per-event entry point: normalizes an event and hands it to the bound
/// [`DeliveryBackend`], containing every failure.
pub struct Dispatcher {
    backend: Option<Arc<dyn DeliveryBackend>>,
    normalizer: Normalizer,
    diagnostics: Arc<dyn Diagnostics>,
    min_level: Level,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn DeliveryBackend>, normalizer: Normalizer) -> Self {
        Dispatcher {
            backend: Some(backend),
            normalizer,
            diagnostics: Arc::new(StderrDiagnostics),
            min_level: Level::NOTSET,
        }
    }

    /// A dispatcher with no backend; every event is ignored.
    pub fn unbound() -> Self {
        Dispatcher {
            backend: None,
            normalizer: Normalizer::default(),
            diagnostics: Arc::new(StderrDiagnostics),
            min_level: Level::NOTSET,
        }
    }

    /// Build the backend described by `config`, or an unbound dispatcher
    /// when the config has no address or topic.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendBuildError> {
        let normalizer = Normalizer::new(config.tags.clone(), config.time.clone());
        if !config.is_bound() {
            return Ok(Dispatcher { normalizer, ..Dispatcher::unbound() });
        }
        let backend = make_sink_from_config(config)?;
        Ok(Dispatcher::new(backend, normalizer))
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_min_level(mut self, min_level: Level) -> Self {
        self.min_level = min_level;
        self
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// Deliver one event.
    ///
    /// **Returns**
    /// - `Ok(())` whether or not delivery succeeded; failures are sent to
    ///   the diagnostics channel.
    /// - `Err(DispatchError::RecursiveFailure)` when called while this
    ///   thread is already dispatching, or from a delivery runtime thread.
    ///   Nothing is delivered in that case.
    pub fn on_event(&self, event: &LogEvent) -> Result<(), DispatchError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        if event.level < self.min_level {
            return Ok(());
        }

        let _guard = DispatchGuard::enter().ok_or(DispatchError::RecursiveFailure)?;
        let envelope = self.normalizer.normalize(event);
        let result = panic::catch_unwind(AssertUnwindSafe(|| backend.deliver(&envelope)))
            .unwrap_or_else(|_| Err(DeliveryError::transport("delivery backend panicked")));

        if let Err(error) = result {
            self.diagnostics.report(backend.target(), &error);
        }
        Ok(())
    }

    /// Drain the backend, if any.
    pub fn shutdown(&self) -> Result<(), DeliveryError> {
        match &self.backend {
            Some(backend) => backend.shutdown(),
            None => Ok(()),
        }
    }
}

/// Counters shared between a [`SinkLayer`] and its owner.
#[derive(Clone, Debug, Default)]
pub struct LayerStats {
    /// Total events seen by the layer (before any filtering).
    pub total_events: Arc<AtomicU64>,
    /// Events handed to the dispatcher and processed.
    pub dispatched_events: Arc<AtomicU64>,
    /// Events refused because dispatch was re-entered.
    pub recursive_events: Arc<AtomicU64>,
}

impl LayerStats {
    pub fn total(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched_events.load(Ordering::Relaxed)
    }

    pub fn recursive(&self) -> u64 {
        self.recursive_events.load(Ordering::Relaxed)
    }
}

/// `tracing_subscriber` layer that turns events into [`LogEvent`]s and
/// dispatches them synchronously on the calling thread.
pub struct SinkLayer {
    dispatcher: Dispatcher,
    stats: LayerStats,
}

impl SinkLayer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        SinkLayer {
            dispatcher,
            stats: LayerStats::default(),
        }
    }

    pub fn stats(&self) -> LayerStats {
        self.stats.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

fn is_transport_target(target: &str) -> bool {
    let root = target.split("::").next().unwrap_or(target);
    TRANSPORT_TARGETS.contains(&root)
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.stats.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if !self.dispatcher.is_bound()
            || is_transport_target(meta.target())
            || Level::from(meta.level()) < self.dispatcher.min_level()
        {
            return;
        }

        match self.dispatcher.on_event(&capture(event)) {
            Ok(()) => {
                self.stats.dispatched_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(DispatchError::RecursiveFailure) => {
                self.stats.recursive_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Snapshot a `tracing` event as a [`LogEvent`].
pub fn capture(event: &Event<'_>) -> LogEvent {
    let meta = event.metadata();
    let mut captured = LogEvent::new(meta.target(), Level::from(meta.level()), String::new()).with_location(
        meta.file().unwrap_or_default(),
        meta.line().unwrap_or_default(),
        meta.module_path().unwrap_or_default(),
    );
    event.record(&mut FieldVisitor { event: &mut captured });
    captured
}

pub struct FieldVisitor<'a> {
    pub event: &'a mut LogEvent,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: FieldValue) {
        self.event.extra.insert(field.name().to_string(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.event.msg = value.to_string(),
            "stack_info" => self.event.stack_info = Some(value.to_string()),
            _ => self.insert(field, FieldValue::Str(value.to_string())),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, FieldValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, FieldValue::UInt(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, FieldValue::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, FieldValue::Bool(value));
    }

    // Several error fields accumulate in field order, one block each.
    fn record_error(&mut self, _field: &Field, value: &(dyn Error + 'static)) {
        let text = self.event.exc_text.get_or_insert_with(String::new);
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&value.to_string());
        let mut source = value.source();
        while let Some(cause) = source {
            text.push_str("\nCaused by: ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.event.msg = format!("{:?}", value),
            "stack_info" => self.event.stack_info = Some(format!("{:?}", value)),
            _ => self.insert(field, FieldValue::other(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBackend {
        delivered: Mutex<Vec<Envelope>>,
        failing: std::sync::atomic::AtomicBool,
    }

    impl DeliveryBackend for MemoryBackend {
        fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::transport("collector down"));
            }
            self.delivered.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        fn target(&self) -> &str {
            "memory"
        }
    }

    #[derive(Default)]
    struct CollectingDiagnostics {
        reports: Mutex<Vec<String>>,
    }

    impl Diagnostics for CollectingDiagnostics {
        fn report(&self, target: &str, error: &DeliveryError) {
            self.reports.lock().unwrap().push(format!("{}: {}", target, error));
        }
    }

    #[test]
    fn unbound_dispatcher_is_a_no_op() {
        let dispatcher = Dispatcher::unbound();
        assert!(!dispatcher.is_bound());
        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "x")), Ok(()));
    }

    #[test]
    fn failures_are_reported_and_not_latched() {
        let backend = Arc::new(MemoryBackend::default());
        let diagnostics = Arc::new(CollectingDiagnostics::default());
        let dispatcher =
            Dispatcher::new(backend.clone(), Normalizer::default()).with_diagnostics(diagnostics.clone());

        backend.failing.store(true, Ordering::SeqCst);
        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "lost")), Ok(()));
        assert_eq!(
            *diagnostics.reports.lock().unwrap(),
            vec!["memory: transport error: collector down".to_string()]
        );

        backend.failing.store(false, Ordering::SeqCst);
        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "kept")), Ok(()));
        let delivered = backend.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].short_message, "kept");
    }

    #[test]
    fn below_min_level_is_skipped() {
        let backend = Arc::new(MemoryBackend::default());
        let dispatcher = Dispatcher::new(backend.clone(), Normalizer::default()).with_min_level(Level::WARNING);
        dispatcher.on_event(&LogEvent::new("app", Level::INFO, "quiet")).unwrap();
        dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "loud")).unwrap();
        assert_eq!(backend.delivered.lock().unwrap().len(), 1);
    }

    struct PanickingBackend;

    impl DeliveryBackend for PanickingBackend {
        fn deliver(&self, _envelope: &Envelope) -> Result<(), DeliveryError> {
            panic!("client bug");
        }

        fn target(&self) -> &str {
            "panicky"
        }
    }

    #[test]
    fn backend_panics_are_contained() {
        let diagnostics = Arc::new(CollectingDiagnostics::default());
        let dispatcher =
            Dispatcher::new(Arc::new(PanickingBackend), Normalizer::default()).with_diagnostics(diagnostics.clone());
        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "x")), Ok(()));
        assert_eq!(diagnostics.reports.lock().unwrap().len(), 1);

        // the guard was released
        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "y")), Ok(()));
    }

    /// Diagnostics that log back into the same dispatcher.
    struct ReenteringDiagnostics {
        dispatcher: Mutex<Option<Arc<Dispatcher>>>,
        outcomes: Mutex<Vec<Result<(), DispatchError>>>,
    }

    impl Diagnostics for ReenteringDiagnostics {
        fn report(&self, _target: &str, error: &DeliveryError) {
            let dispatcher = self.dispatcher.lock().unwrap().clone();
            if let Some(dispatcher) = dispatcher {
                let outcome = dispatcher.on_event(&LogEvent::new("diag", Level::ERROR, error.to_string()));
                self.outcomes.lock().unwrap().push(outcome);
            }
        }
    }

    #[test]
    fn reentrant_dispatch_yields_recursive_failure() {
        let backend = Arc::new(MemoryBackend::default());
        backend.failing.store(true, Ordering::SeqCst);
        let diagnostics = Arc::new(ReenteringDiagnostics {
            dispatcher: Mutex::new(None),
            outcomes: Mutex::new(Vec::new()),
        });
        let dispatcher =
            Arc::new(Dispatcher::new(backend.clone(), Normalizer::default()).with_diagnostics(diagnostics.clone()));
        *diagnostics.dispatcher.lock().unwrap() = Some(Arc::clone(&dispatcher));

        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "x")), Ok(()));
        assert_eq!(
            *diagnostics.outcomes.lock().unwrap(),
            vec![Err(DispatchError::RecursiveFailure)]
        );

        // break the Arc cycle
        diagnostics.dispatcher.lock().unwrap().take();
    }

    #[test]
    fn delivery_threads_refuse_dispatch() {
        let backend = Arc::new(MemoryBackend::default());
        let dispatcher = Dispatcher::new(backend.clone(), Normalizer::default());
        let outcome = std::thread::scope(|s| {
            s.spawn(|| {
                mark_delivery_thread();
                dispatcher.on_event(&LogEvent::new("hyper", Level::DEBUG, "x"))
            })
            .join()
            .unwrap()
        });
        assert_eq!(outcome, Err(DispatchError::RecursiveFailure));
        assert!(backend.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn unrenderable_time_format_still_delivers() {
        use crate::clock::{TimeZone, Timestamper};
        use crate::envelope::EnvelopeTags;

        let backend = Arc::new(MemoryBackend::default());
        let normalizer = Normalizer::new(EnvelopeTags::default(), Timestamper::new(TimeZone::Utc, "%Y-%Q"));
        let dispatcher = Dispatcher::new(backend.clone(), normalizer);

        assert_eq!(dispatcher.on_event(&LogEvent::new("app", Level::ERROR, "x")), Ok(()));
        let delivered = backend.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&delivered[0].time).is_ok());
    }

    #[test]
    fn transport_targets() {
        assert!(is_transport_target("hyper::proto::h1"));
        assert!(is_transport_target("reqwest"));
        assert!(!is_transport_target("hyperion::api"));
        assert!(!is_transport_target("my_app"));
    }
}
