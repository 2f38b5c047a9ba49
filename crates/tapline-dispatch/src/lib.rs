//! # tapline-dispatch
//!
//! Hook-chain dispatch engine for the Tapline interception layer. Provides:
//!
//! - Ordered, opcode-keyed hook registration with priority groups
//! - The per-packet matching pipeline ([`Dispatch::handle`]) with
//!   replace/drop verdicts and fail-open decode handling
//! - The outbound injector ([`Dispatch::write`]) that loops synthetic
//!   packets through the same pipeline before transmission
//! - Module lifecycle (load/unload/reset) with bulk unhook on unload
//! - Fault-isolated diagnostics that attribute errors to the offending
//!   module rather than engine plumbing
//!
//! The engine is single-threaded and fully synchronous: hooks run to
//! completion one at a time, and a hook may re-enter any engine operation
//! (register, unregister, inject, load, unload) mid-dispatch.

pub mod diag;
pub mod engine;
pub mod hooks;
pub mod modules;
pub mod prelude;

pub use engine::Dispatch;
pub use hooks::definitions::{HookAction, HookKey, HookSpec, OriginFilter, PacketEvent, RawAction};
pub use hooks::table::HookHandle;
pub use modules::{CtorResolver, Module, ModuleContext, ModuleCtor, ModuleResolver};
