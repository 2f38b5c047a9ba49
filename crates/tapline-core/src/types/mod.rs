//! Core type definitions used across the Tapline workspace.

pub mod direction;
pub mod frame;
pub mod name;
pub mod version;

pub use direction::Direction;
pub use frame::{HEADER_LEN, opcode_of};
pub use name::normalize_name;
pub use version::ProtocolVersion;
