//! Structured codec collaborator.

use bytes::Bytes;
use serde_json::Value;

use crate::result::DispatchResult;
use crate::types::version::ProtocolVersion;

/// External codec that maps opcodes to names and performs structured
/// parse/encode against a schema registry.
///
/// The dispatch engine takes the codec as an explicit constructor
/// dependency, so independent engine instances can run against independent
/// (including test-only) schema registries.
pub trait ProtocolCodec {
    /// Resolve a canonical message name to its opcode.
    fn opcode_of(&self, name: &str) -> Option<u16>;

    /// Resolve an opcode back to its canonical message name.
    fn name_of(&self, opcode: u16) -> Option<String>;

    /// Decode a complete framed buffer into a structured event.
    ///
    /// [`ProtocolVersion::Latest`] resolves to the newest schema revision
    /// known for the opcode.
    fn parse(&self, opcode: u16, version: ProtocolVersion, buf: &[u8]) -> DispatchResult<Value>;

    /// Encode a structured event into a complete framed buffer, header
    /// included.
    fn encode(&self, opcode: u16, version: ProtocolVersion, event: &Value) -> DispatchResult<Bytes>;
}
