use crate::envelope::Envelope;
use crate::error::DeliveryError;

/// Destination for [`Envelope`]s produced by the dispatcher.
///
/// Implementations transport envelopes to a concrete backend (an HTTP
/// collector, a Kafka topic, ...). The contract is synchronous: `deliver`
/// returns once the backend-specific notion of "done" is reached, which
/// ranges from "handed to a buffer" to "acknowledged by the broker".
pub trait DeliveryBackend: Send + Sync {
    /// Ship a single envelope.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the envelope.
    /// - `Err(..)` on serialization, network or broker failure. The
    ///   dispatcher reports the error and drops the envelope; there is no
    ///   retry.
    ///
    /// Implementations must not panic: a failing transport is an `Err`.
    fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError>;

    /// Address the backend ships to, used in failure reports.
    fn target(&self) -> &str;

    /// Drain any buffered envelopes.
    ///
    /// Default implementation is a no-op.
    fn shutdown(&self) -> Result<(), DeliveryError> {
        Ok(())
    }
}
