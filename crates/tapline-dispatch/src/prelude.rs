//! Prelude for convenient imports in module code.

pub use bytes::Bytes;
pub use serde_json::{Value, json};

pub use tapline_core::error::{DispatchError, ErrorKind};
pub use tapline_core::result::DispatchResult;
pub use tapline_core::traits::codec::ProtocolCodec;
pub use tapline_core::traits::transport::Transport;
pub use tapline_core::types::direction::Direction;
pub use tapline_core::types::version::ProtocolVersion;

pub use crate::engine::Dispatch;
pub use crate::hooks::definitions::{
    HookAction, HookKey, HookSpec, OriginFilter, PacketEvent, RawAction,
};
pub use crate::hooks::table::HookHandle;
pub use crate::modules::{CtorResolver, Module, ModuleContext, ModuleCtor, ModuleResolver};
