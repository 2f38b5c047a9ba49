//! Hook system — typed hook definitions and the ordered hook table.

pub mod definitions;
pub mod table;

pub use definitions::{HookAction, HookKey, HookSpec, OriginFilter, PacketEvent, RawAction};
pub use table::{HookHandle, HookTable};
