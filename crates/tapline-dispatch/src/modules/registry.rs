//! Module lifecycle operations on the engine: load, unload, reset.

use std::rc::Rc;

use tracing::info;

use crate::diag;
use crate::engine::Dispatch;
use crate::modules::{Module, ModuleContext, ModuleResolver};

impl Dispatch {
    /// Load a module by name.
    ///
    /// Idempotent per name: the cached instance is returned when the name
    /// is already loaded. Resolution or construction failure (error or
    /// panic) is logged and leaves the module unregistered.
    pub fn load(self: &Rc<Self>, name: &str, resolver: &dyn ModuleResolver) -> Option<Rc<dyn Module>> {
        if let Some(existing) = self.modules.borrow().get(name) {
            return Some(existing.clone());
        }

        let Some(ctor) = resolver.resolve(name) else {
            diag::report(&[&format!("Cannot resolve a constructor for module '{name}'")]);
            return None;
        };

        let context = ModuleContext::new(self.clone(), name.to_string());
        match diag::isolate(|| ctor(context)) {
            Ok(module) => {
                self.modules
                    .borrow_mut()
                    .insert(name.to_string(), module.clone());
                info!(module = %name, "Module loaded");
                Some(module)
            }
            Err(err) => {
                diag::report(&[
                    &format!("Module '{name}' failed to construct: {err}"),
                    &diag::filtered_stack(),
                ]);
                None
            }
        }
    }

    /// Unload a module by name.
    ///
    /// Removes every hook the module owns across all buckets, runs the
    /// optional teardown under fault isolation, and deregisters the
    /// instance. Returns `false` only when the name is not loaded.
    pub fn unload(&self, name: &str) -> bool {
        // Deregister first so a reentrant unload from inside teardown is a
        // clean no-op instead of a double teardown.
        let module = self.modules.borrow_mut().remove(name);
        let Some(module) = module else {
            diag::report(&[&format!("Tried to unload module '{name}', which is not loaded")]);
            return false;
        };

        let unhooked = self.unhook_module(name);

        if let Err(err) = diag::isolate(|| {
            module.unload();
            Ok(())
        }) {
            diag::report(&[
                &format!("Module '{name}' teardown failed: {err}"),
                &diag::filtered_stack(),
            ]);
        }

        info!(module = %name, unhooked, "Module unloaded");
        true
    }

    /// Unload every module and clear both registries.
    ///
    /// Individual unload failures are logged and do not stop the sweep;
    /// both the module map and the hook table end up empty regardless.
    pub fn reset(&self) {
        let names: Vec<String> = self.modules.borrow().keys().cloned().collect();
        for name in names {
            self.unload(&name);
        }
        self.modules.borrow_mut().clear();
        self.clear_hooks();
        info!("Dispatch reset: all modules unloaded, hook table cleared");
    }

    /// Whether a module is currently loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.borrow().contains_key(name)
    }

    /// Names of all loaded modules.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.modules.borrow().keys().cloned().collect()
    }
}
