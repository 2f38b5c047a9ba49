//! Ordered, opcode-keyed hook table.
//!
//! Each bucket holds a sequence of order groups kept sorted ascending by
//! priority; hooks within a group run in registration order. Removal is by
//! hook identity or by owning module.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tapline_core::types::version::ProtocolVersion;

use super::definitions::{EventCallback, HookKey, OriginFilter, RawCallback};

/// The callback half of a registered hook.
pub(crate) enum HookKind {
    /// Bypasses the codec; sees the undecoded buffer.
    Raw(Box<RawCallback>),
    /// Decoded through the codec at the given schema version.
    Event {
        version: ProtocolVersion,
        callback: Box<EventCallback>,
    },
}

/// One registered hook. Immutable once created apart from its liveness
/// flag, which is cleared on removal so in-flight dispatch passes skip it.
pub struct HookEntry {
    pub(crate) id: u64,
    pub(crate) key: HookKey,
    pub(crate) order: i32,
    pub(crate) filter: OriginFilter,
    pub(crate) module: Option<String>,
    pub(crate) label: String,
    pub(crate) kind: HookKind,
    pub(crate) alive: Cell<bool>,
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("order", &self.order)
            .field("filter", &self.filter)
            .field("module", &self.module)
            .field("label", &self.label)
            .field("alive", &self.alive.get())
            .finish()
    }
}

/// Opaque handle returned by registration, used for identity-based removal.
#[derive(Debug, Clone)]
pub struct HookHandle(pub(crate) Rc<HookEntry>);

impl HookHandle {
    /// The bucket this hook was registered under.
    pub fn key(&self) -> HookKey {
        self.0.key
    }

    /// The hook's execution priority.
    pub fn order(&self) -> i32 {
        self.0.order
    }

    /// The owning module, if the hook was tagged with one.
    pub fn module(&self) -> Option<&str> {
        self.0.module.as_deref()
    }

    /// The normalized message name the hook was registered for.
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Whether the hook is still registered.
    pub fn is_alive(&self) -> bool {
        self.0.alive.get()
    }
}

/// Hooks sharing one priority order, in registration order.
#[derive(Debug)]
struct OrderGroup {
    order: i32,
    hooks: Vec<Rc<HookEntry>>,
}

/// Mapping from bucket key to its sorted order-group sequence.
///
/// Invariant: at most one group per (key, order) pair, and every bucket's
/// groups are sorted ascending by order at all times.
#[derive(Debug)]
pub struct HookTable {
    buckets: HashMap<HookKey, Vec<OrderGroup>>,
    prune_empty: bool,
}

impl HookTable {
    /// Create an empty table.
    pub(crate) fn new(prune_empty: bool) -> Self {
        Self {
            buckets: HashMap::new(),
            prune_empty,
        }
    }

    /// Insert a hook at the sorted position for its order.
    ///
    /// An existing group for the order appends (registration order is
    /// preserved); otherwise a singleton group is spliced in.
    pub(crate) fn insert(&mut self, entry: Rc<HookEntry>) {
        let groups = self.buckets.entry(entry.key).or_default();
        match groups.binary_search_by_key(&entry.order, |g| g.order) {
            Ok(i) => groups[i].hooks.push(entry),
            Err(i) => groups.insert(
                i,
                OrderGroup {
                    order: entry.order,
                    hooks: vec![entry],
                },
            ),
        }
    }

    /// Remove a specific hook by identity.
    ///
    /// The liveness flag is cleared regardless, so any snapshot already
    /// taken skips the hook. No-op when the bucket or group is gone.
    pub(crate) fn remove(&mut self, handle: &HookHandle) -> bool {
        let entry = &handle.0;
        entry.alive.set(false);

        let Some(groups) = self.buckets.get_mut(&entry.key) else {
            return false;
        };
        let Ok(i) = groups.binary_search_by_key(&entry.order, |g| g.order) else {
            return false;
        };

        let before = groups[i].hooks.len();
        groups[i].hooks.retain(|h| h.id != entry.id);
        let removed = groups[i].hooks.len() < before;

        if self.prune_empty && groups[i].hooks.is_empty() {
            groups.remove(i);
            if groups.is_empty() {
                self.buckets.remove(&entry.key);
            }
        }
        removed
    }

    /// Remove every hook owned by a module, across all buckets.
    pub(crate) fn remove_module(&mut self, module: &str) -> usize {
        let mut removed = 0;
        for groups in self.buckets.values_mut() {
            for group in groups.iter_mut() {
                group.hooks.retain(|h| {
                    if h.module.as_deref() == Some(module) {
                        h.alive.set(false);
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
            }
            if self.prune_empty {
                groups.retain(|g| !g.hooks.is_empty());
            }
        }
        if self.prune_empty {
            self.buckets.retain(|_, groups| !groups.is_empty());
        }
        removed
    }

    /// The flattened, ordered hook sequence of one bucket at this instant.
    ///
    /// Dispatch snapshots a bucket once per pass; structural mutation during
    /// the pass does not disturb the snapshot.
    pub(crate) fn snapshot(&self, key: HookKey) -> Vec<Rc<HookEntry>> {
        self.buckets
            .get(&key)
            .map(|groups| {
                groups
                    .iter()
                    .flat_map(|g| g.hooks.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every hook, marking each dead.
    pub(crate) fn clear(&mut self) {
        for groups in self.buckets.values() {
            for group in groups {
                for hook in &group.hooks {
                    hook.alive.set(false);
                }
            }
        }
        self.buckets.clear();
    }

    /// Number of live hooks in one bucket.
    #[cfg(test)]
    fn bucket_len(&self, key: HookKey) -> usize {
        self.snapshot(key).len()
    }

    /// Number of order groups in one bucket.
    #[cfg(test)]
    fn group_count(&self, key: HookKey) -> usize {
        self.buckets.get(&key).map(|g| g.len()).unwrap_or(0)
    }
}
