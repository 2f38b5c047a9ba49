//! Wire frame layout.
//!
//! Every protocol message starts with a 4-byte header: a 16-bit length
//! field at offset 0 followed by a little-endian 16-bit opcode at offset 2.
//! The dispatch engine never inspects bytes beyond the header.

/// Size of the frame header in bytes.
pub const HEADER_LEN: usize = 4;

/// Extract the opcode from a framed buffer.
///
/// Returns `None` for buffers shorter than the header.
pub fn opcode_of(buf: &[u8]) -> Option<u16> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_le_bytes([buf[2], buf[3]]))
}
