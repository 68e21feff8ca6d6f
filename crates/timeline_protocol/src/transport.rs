use crate::error::TransportError;
use crate::fetch::FetchRequest;

/// Outbound side of the transport as seen by the sync engine.
///
/// Requests are fire-and-forget: the matching [`crate::FetchResponse`] is
/// delivered later on the inbound stream like any other message. An `Err`
/// means the request was never sent.
pub trait TimelineTransport: Send + Sync + 'static {
    fn send_fetch(&self, request: FetchRequest) -> Result<(), TransportError>;
}
