//! Module system — lifecycle trait, constructor resolution, and the
//! per-module capability facade.

pub mod registry;

use std::rc::Rc;

use bytes::Bytes;
use serde_json::Value;

use tapline_core::error::DispatchError;
use tapline_core::types::direction::Direction;
use tapline_core::types::version::ProtocolVersion;

use crate::engine::Dispatch;
use crate::hooks::definitions::{HookAction, HookSpec, PacketEvent, RawAction};
use crate::hooks::table::HookHandle;

/// A loaded module instance.
///
/// Modules are opaque to the engine; the only lifecycle obligation is the
/// optional teardown, which runs under fault isolation on unload.
pub trait Module {
    /// Called once when the module is unloaded. Hooks owned by the module
    /// are already removed by the time this runs.
    fn unload(&self) {}
}

/// Constructor producing a module instance from its capability facade.
pub type ModuleCtor = Rc<dyn Fn(ModuleContext) -> Result<Rc<dyn Module>, DispatchError>>;

/// Resolves a module name to its constructor.
///
/// Implementations typically wrap whatever packaging mechanism delivers
/// module code; the engine only needs the name-to-constructor mapping.
pub trait ModuleResolver {
    /// Look up the constructor for a module name.
    fn resolve(&self, name: &str) -> Option<ModuleCtor>;
}

/// Adapter treating a bare constructor as a resolver that resolves every
/// name to itself.
pub struct CtorResolver(ModuleCtor);

impl CtorResolver {
    /// Wrap a bare constructor function.
    pub fn new<F>(ctor: F) -> Self
    where
        F: Fn(ModuleContext) -> Result<Rc<dyn Module>, DispatchError> + 'static,
    {
        Self(Rc::new(ctor))
    }
}

impl ModuleResolver for CtorResolver {
    fn resolve(&self, _name: &str) -> Option<ModuleCtor> {
        Some(self.0.clone())
    }
}

/// Per-module capability facade handed to constructors.
///
/// Wraps the engine's raw entry points so that every registration made
/// through it is tagged with the module's identity, which is what bulk
/// unhook on unload and fault attribution key on.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    engine: Rc<Dispatch>,
    module: String,
}

impl ModuleContext {
    pub(crate) fn new(engine: Rc<Dispatch>, module: String) -> Self {
        Self { engine, module }
    }

    /// The name this module was loaded under.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// The underlying engine, for operations the facade does not wrap.
    pub fn engine(&self) -> &Rc<Dispatch> {
        &self.engine
    }

    /// Register a structured hook owned by this module.
    pub fn hook<F>(&self, spec: HookSpec, callback: F) -> HookHandle
    where
        F: Fn(&mut PacketEvent, bool) -> Result<HookAction, DispatchError> + 'static,
    {
        self.engine.hook(spec.module(self.module.clone()), callback)
    }

    /// Register a raw hook owned by this module.
    pub fn hook_raw<F>(&self, spec: HookSpec, callback: F) -> HookHandle
    where
        F: Fn(u16, &[u8], Direction, bool) -> Result<RawAction, DispatchError> + 'static,
    {
        self.engine
            .hook_raw(spec.module(self.module.clone()), callback)
    }

    /// Remove a hook registered through this facade.
    pub fn unhook(&self, handle: &HookHandle) -> bool {
        self.engine.unhook(handle)
    }

    /// Inject a structured message.
    pub fn write(
        &self,
        dir: Direction,
        name: &str,
        version: Option<ProtocolVersion>,
        data: Value,
    ) -> bool {
        self.engine.write(dir, name, version, data)
    }

    /// Inject an already-encoded buffer.
    pub fn write_raw(&self, dir: Direction, buf: Bytes) -> bool {
        self.engine.write_raw(dir, buf)
    }
}
