use std::future::Future;
use tokio::runtime::{Builder, Runtime};

use crate::error::DeliveryError;
use crate::layer::mark_delivery_thread;

/// Private Tokio runtime that runs an asynchronous transport exchange to
/// completion for a synchronous caller.
///
/// The caller may itself live inside another runtime; the future never
/// runs on the caller's executor, so no `block_on` nesting occurs.
pub struct Bridge {
    runtime: Option<Runtime>,
}

impl Bridge {
    pub fn new(thread_name: &str) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(thread_name)
            .on_thread_start(mark_delivery_thread)
            .enable_all()
            .build()?;
        Ok(Bridge { runtime: Some(runtime) })
    }

    /// Spawn `fut` on the bridge runtime and block until it resolves.
    pub fn run<F, T>(&self, fut: F) -> Result<T, DeliveryError>
    where
        F: Future<Output = Result<T, DeliveryError>> + Send + 'static,
        T: Send + 'static,
    {
        let runtime = self.runtime.as_ref().ok_or(DeliveryError::BridgeClosed)?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        runtime.spawn(async move {
            let _ = tx.send(fut.await);
        });
        rx.recv().map_err(|_| DeliveryError::BridgeClosed)?
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // A plain drop blocks and panics when it happens inside another
        // runtime's async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
