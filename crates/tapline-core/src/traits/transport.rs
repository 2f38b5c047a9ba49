//! Transport collaborator.

/// The object that physically sends buffers on the intercepted connection.
///
/// The outbound injector invokes this directly; callers of the dispatch
/// pipeline forward its returned buffer themselves.
pub trait Transport {
    /// Send a framed buffer toward the server.
    fn send_to_server(&self, buf: &[u8]);

    /// Send a framed buffer toward the client.
    fn send_to_client(&self, buf: &[u8]);
}
