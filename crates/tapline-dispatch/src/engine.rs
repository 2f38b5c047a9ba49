//! The dispatch engine: per-packet hook pipeline and outbound injector.
//!
//! Execution is single-threaded, synchronous, and reentrant. All interior
//! state sits behind `RefCell`/`Cell`, and no borrow is held across a
//! callback invocation, so a hook may register, unregister, inject, load,
//! or unload mid-dispatch.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

use tapline_core::config::dispatch::{DispatchConfig, implied_version_warning_suppressed};
use tapline_core::error::DispatchError;
use tapline_core::traits::codec::ProtocolCodec;
use tapline_core::traits::transport::Transport;
use tapline_core::types::direction::Direction;
use tapline_core::types::frame::opcode_of;
use tapline_core::types::name::normalize_name;
use tapline_core::types::version::ProtocolVersion;

use crate::diag;
use crate::hooks::definitions::{
    HookAction, HookKey, HookSpec, PacketEvent, RawAction, resolve_target,
};
use crate::hooks::table::{HookEntry, HookHandle, HookKind, HookTable};
use crate::modules::Module;

/// The hook-chain dispatch engine.
///
/// Constructed with its codec collaborator; the transport is bound once
/// the intercepted connection exists. Modules hold an `Rc<Dispatch>` and
/// drive everything through it.
pub struct Dispatch {
    config: DispatchConfig,
    codec: Rc<dyn ProtocolCodec>,
    transport: RefCell<Option<Rc<dyn Transport>>>,
    table: RefCell<HookTable>,
    pub(crate) modules: RefCell<HashMap<String, Rc<dyn Module>>>,
    next_hook_id: Cell<u64>,
}

impl Dispatch {
    /// Create an engine against the given codec.
    pub fn new(config: DispatchConfig, codec: Rc<dyn ProtocolCodec>) -> Rc<Self> {
        let table = HookTable::new(config.prune_empty_order_groups);
        Rc::new(Self {
            config,
            codec,
            transport: RefCell::new(None),
            table: RefCell::new(table),
            modules: RefCell::new(HashMap::new()),
            next_hook_id: Cell::new(1),
        })
    }

    /// Bind (or replace) the transport the injector sends through.
    pub fn bind_transport(&self, transport: Rc<dyn Transport>) {
        *self.transport.borrow_mut() = Some(transport);
    }

    /// The codec this engine decodes and encodes against.
    pub fn codec(&self) -> &Rc<dyn ProtocolCodec> {
        &self.codec
    }

    fn next_id(&self) -> u64 {
        let id = self.next_hook_id.get();
        self.next_hook_id.set(id + 1);
        id
    }

    fn warn_implied_version(&self) -> bool {
        self.config.warn_implied_version && !implied_version_warning_suppressed()
    }

    /// Register a structured hook.
    ///
    /// The callback receives the decoded event and the synthesized-origin
    /// flag; see [`HookAction`] for the return contract. Registration
    /// always succeeds structurally: an unresolvable name is parked on the
    /// unknown-opcode bucket with a diagnostic.
    pub fn hook<F>(&self, spec: HookSpec, callback: F) -> HookHandle
    where
        F: Fn(&mut PacketEvent, bool) -> Result<HookAction, DispatchError> + 'static,
    {
        let target = resolve_target(&spec, self.codec.as_ref(), false, self.warn_implied_version());
        self.insert_entry(
            spec,
            target.key,
            target.label,
            HookKind::Event {
                version: target.version,
                callback: Box::new(callback),
            },
        )
    }

    /// Register a raw hook that bypasses the codec.
    ///
    /// The callback receives `(opcode, buffer, direction, fake)`; see
    /// [`RawAction`] for the return contract.
    pub fn hook_raw<F>(&self, spec: HookSpec, callback: F) -> HookHandle
    where
        F: Fn(u16, &[u8], Direction, bool) -> Result<RawAction, DispatchError> + 'static,
    {
        let target = resolve_target(&spec, self.codec.as_ref(), true, self.warn_implied_version());
        self.insert_entry(spec, target.key, target.label, HookKind::Raw(Box::new(callback)))
    }

    fn insert_entry(
        &self,
        spec: HookSpec,
        key: HookKey,
        label: String,
        kind: HookKind,
    ) -> HookHandle {
        let entry = Rc::new(HookEntry {
            id: self.next_id(),
            key,
            order: spec.order,
            filter: spec.filter,
            module: spec.module,
            label,
            kind,
            alive: Cell::new(true),
        });
        self.table.borrow_mut().insert(entry.clone());
        debug!(
            key = %entry.key,
            message = %entry.label,
            order = entry.order,
            module = ?entry.module,
            "Hook registered"
        );
        HookHandle(entry)
    }

    /// Remove every hook owned by a module. Used by unload.
    pub(crate) fn unhook_module(&self, module: &str) -> usize {
        self.table.borrow_mut().remove_module(module)
    }

    /// Drop every hook in the table. Used by reset.
    pub(crate) fn clear_hooks(&self) {
        self.table.borrow_mut().clear();
    }

    /// Remove a hook by identity. No-op if it is already gone.
    pub fn unhook(&self, handle: &HookHandle) -> bool {
        let removed = self.table.borrow_mut().remove(handle);
        if removed {
            debug!(key = %handle.key(), message = %handle.label(), "Hook removed");
        }
        removed
    }

    /// Run a packet through every matching hook.
    ///
    /// Returns the final (possibly re-encoded) buffer, or `None` when a
    /// hook dropped the packet. The wildcard bucket runs first, then the
    /// bucket for the buffer's opcode; groups run ascending by order,
    /// registration order within a group.
    ///
    /// The matching set is snapshotted once at pass start: hooks removed
    /// mid-pass are skipped, hooks added mid-pass wait for the next pass.
    pub fn handle(&self, buf: Bytes, dir: Direction, fake: bool) -> Option<Bytes> {
        let Some(opcode) = opcode_of(&buf) else {
            warn!(len = buf.len(), "Buffer shorter than frame header; forwarding untouched");
            return Some(buf);
        };

        let snapshot = {
            let table = self.table.borrow();
            let mut hooks = table.snapshot(HookKey::Wildcard);
            hooks.extend(table.snapshot(HookKey::Opcode(opcode)));
            hooks
        };

        let mut working = buf;
        for entry in &snapshot {
            if !entry.alive.get() || !entry.filter.matches(fake) {
                continue;
            }

            match &entry.kind {
                HookKind::Raw(callback) => {
                    match diag::isolate(|| callback(opcode, &working, dir, fake)) {
                        Ok(RawAction::Continue) => {}
                        Ok(RawAction::Replace(replacement)) => working = replacement,
                        Ok(RawAction::Drop) => {
                            debug!(opcode, message = %entry.label, "Packet dropped by raw hook");
                            return None;
                        }
                        Err(err) => self.report_hook_fault(entry.as_ref(), opcode, &err),
                    }
                }
                HookKind::Event { version, callback } => {
                    let data = match self.codec.parse(opcode, *version, &working) {
                        Ok(data) => data,
                        Err(err) => {
                            self.report_decode_failure(entry.as_ref(), opcode, *version, &err);
                            // Fail open: forward the last good buffer
                            // rather than corrupt traffic.
                            return Some(working);
                        }
                    };
                    let mut event = PacketEvent {
                        opcode,
                        name: self.codec.name_of(opcode),
                        version: *version,
                        data,
                    };
                    match diag::isolate(|| callback(&mut event, fake)) {
                        Ok(HookAction::Continue) => {}
                        Ok(HookAction::Modified) => {
                            match self.codec.encode(opcode, *version, &event.data) {
                                Ok(encoded) => working = encoded,
                                Err(err) => self.report_encode_failure(entry.as_ref(), opcode, &err),
                            }
                        }
                        Ok(HookAction::Drop) => {
                            debug!(opcode, message = %entry.label, "Packet dropped by hook");
                            return None;
                        }
                        Err(err) => self.report_hook_fault(entry.as_ref(), opcode, &err),
                    }
                }
            }
        }

        Some(working)
    }

    /// Inject a structured message through the full hook pipeline and the
    /// transport.
    ///
    /// The encoded buffer passes through [`Dispatch::handle`] with
    /// `fake = true` so fake/all hooks observe self-originated traffic;
    /// a drop verdict there aborts the send. Returns whether the message
    /// reached the transport.
    pub fn write(
        &self,
        dir: Direction,
        name: &str,
        version: Option<ProtocolVersion>,
        data: Value,
    ) -> bool {
        let transport = self.transport.borrow().clone();
        let Some(transport) = transport else {
            diag::report(&["Cannot inject a message: no transport is bound"]);
            return false;
        };

        let canonical = normalize_name(name);
        let Some(opcode) = self.codec.opcode_of(&canonical) else {
            diag::report(&[&format!(
                "Cannot inject '{canonical}': name does not resolve to an opcode"
            )]);
            return false;
        };

        let version = version.unwrap_or_else(|| {
            if self.warn_implied_version() {
                warn!(
                    message = %canonical,
                    "Message injected without an explicit schema version; implied latest is deprecated"
                );
            }
            ProtocolVersion::Latest
        });

        let buf = match self.codec.encode(opcode, version, &data) {
            Ok(buf) => buf,
            Err(err) => {
                diag::report_with(
                    &[&format!(
                        "Failed to encode injected message {canonical} (version {version})"
                    )],
                    &err,
                );
                return false;
            }
        };

        self.loop_and_send(transport, dir, buf)
    }

    /// Inject an already-encoded buffer through the pipeline and transport.
    pub fn write_raw(&self, dir: Direction, buf: Bytes) -> bool {
        let transport = self.transport.borrow().clone();
        let Some(transport) = transport else {
            diag::report(&["Cannot inject a buffer: no transport is bound"]);
            return false;
        };
        self.loop_and_send(transport, dir, buf)
    }

    /// Route a synthetic buffer through dispatch, then hand the survivor to
    /// the transport primitive matching its direction.
    fn loop_and_send(&self, transport: Rc<dyn Transport>, dir: Direction, buf: Bytes) -> bool {
        let Some(out) = self.handle(buf, dir, true) else {
            debug!(dir = %dir, "Injected packet dropped by a hook");
            return false;
        };
        match dir {
            Direction::ClientToServer => transport.send_to_server(&out),
            Direction::ServerToClient => transport.send_to_client(&out),
        }
        true
    }

    fn report_hook_fault(&self, entry: &HookEntry, opcode: u16, err: &DispatchError) {
        diag::report(&[
            &format!("Hook callback failed: {err}"),
            &format!(
                "hook: {} (order {}), module: {}",
                entry.label,
                entry.order,
                entry.module.as_deref().unwrap_or("<unattributed>")
            ),
            &format!("opcode: {opcode}"),
            &diag::filtered_stack(),
        ]);
    }

    fn report_decode_failure(
        &self,
        entry: &HookEntry,
        opcode: u16,
        version: ProtocolVersion,
        err: &DispatchError,
    ) {
        diag::report_with(
            &[
                &format!(
                    "Failed to parse {} (opcode {opcode}, version {version}): {err}",
                    entry.label
                ),
                &format!(
                    "requested by module: {}",
                    entry.module.as_deref().unwrap_or("<unattributed>")
                ),
                "Dispatch for this packet stopped; forwarding the buffer unchanged",
                &diag::filtered_stack(),
            ],
            &err,
        );
    }

    fn report_encode_failure(&self, entry: &HookEntry, opcode: u16, err: &DispatchError) {
        diag::report_with(
            &[
                &format!(
                    "Failed to re-encode {} (opcode {opcode}) after mutation by module {}",
                    entry.label,
                    entry.module.as_deref().unwrap_or("<unattributed>")
                ),
                "The mutation was discarded; dispatch continues with the previous buffer",
            ],
            &err,
        );
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("config", &self.config)
            .field("transport_bound", &self.transport.borrow().is_some())
            .field("modules", &self.modules.borrow().len())
            .finish()
    }
}
