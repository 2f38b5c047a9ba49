//! Traits for the external collaborators of the dispatch engine.

pub mod codec;
pub mod transport;

pub use codec::ProtocolCodec;
pub use transport::Transport;
