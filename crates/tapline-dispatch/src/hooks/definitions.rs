//! Typed hook definitions: table keys, origin filters, callback verdicts,
//! and the normalized registration spec.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tapline_core::error::DispatchError;
use tapline_core::traits::codec::ProtocolCodec;
use tapline_core::types::direction::Direction;
use tapline_core::types::name::{WILDCARD, normalize_name};
use tapline_core::types::version::ProtocolVersion;

use crate::diag;

/// Key of a hook chain in the hook table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKey {
    /// Matches every dispatched packet, decoded or raw.
    Wildcard,
    /// Bucket for hooks whose message name could not be resolved to an
    /// opcode. Never matched by traffic.
    Unknown,
    /// A concrete protocol opcode.
    Opcode(u16),
}

impl std::fmt::Display for HookKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::Unknown => write!(f, "?"),
            Self::Opcode(op) => write!(f, "{op}"),
        }
    }
}

/// Which packet origins a hook observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginFilter {
    /// Only packets observed on the wire.
    #[default]
    Real,
    /// Only packets synthesized by the outbound injector.
    Fake,
    /// Both.
    All,
}

impl OriginFilter {
    /// Whether a packet with the given origin passes this filter.
    pub fn matches(self, fake: bool) -> bool {
        match self {
            Self::Real => !fake,
            Self::Fake => fake,
            Self::All => true,
        }
    }
}

/// Verdict returned by a structured hook callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// No mutation; continue to the next hook.
    Continue,
    /// The event was mutated in place; re-encode it before the next hook.
    Modified,
    /// Drop the packet. Dispatch stops immediately.
    Drop,
}

/// Verdict returned by a raw hook callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAction {
    /// Keep the working buffer; continue to the next hook.
    Continue,
    /// Replace the working buffer for subsequent hooks.
    Replace(Bytes),
    /// Drop the packet. Dispatch stops immediately.
    Drop,
}

/// A decoded protocol message handed to structured hook callbacks.
///
/// Callbacks mutate [`PacketEvent::data`] in place and return
/// [`HookAction::Modified`] to have the engine re-encode it.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// The message opcode.
    pub opcode: u16,
    /// Canonical message name, when the codec knows one.
    pub name: Option<String>,
    /// The schema version the buffer was decoded with.
    pub version: ProtocolVersion,
    /// The decoded fields.
    pub data: Value,
}

/// Callback for structured hooks. Receives the decoded event and whether
/// the packet was synthesized by the injector.
pub type EventCallback = dyn Fn(&mut PacketEvent, bool) -> Result<HookAction, DispatchError>;

/// Callback for raw hooks. Receives the opcode, the undecoded working
/// buffer, the travel direction, and the synthesized-origin flag.
pub type RawCallback = dyn Fn(u16, &[u8], Direction, bool) -> Result<RawAction, DispatchError>;

/// Canonical hook registration configuration.
///
/// All optional knobs live here with explicit defaults, so every
/// registration path funnels through one normalization step regardless of
/// how the caller phrased it.
#[derive(Debug, Clone)]
pub struct HookSpec {
    /// Message name as given by the caller: camelCase or canonical
    /// UPPER_SNAKE_CASE, or `"*"` for the wildcard.
    pub message: String,
    /// Requested schema version. `None` implies latest and emits a
    /// deprecation diagnostic unless suppressed. Ignored by raw hooks.
    pub version: Option<ProtocolVersion>,
    /// Execution priority, ascending. Hooks sharing an order run in
    /// registration order.
    pub order: i32,
    /// Which packet origins the hook observes.
    pub filter: OriginFilter,
    /// Owning module, for diagnostics and bulk unhook on unload.
    pub module: Option<String>,
}

impl HookSpec {
    /// Start a spec for the given message name with all defaults.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            version: None,
            order: 0,
            filter: OriginFilter::Real,
            module: None,
        }
    }

    /// Request a specific schema version (or [`ProtocolVersion::Latest`]
    /// explicitly, which silences the implied-version diagnostic).
    pub fn version(mut self, version: impl Into<ProtocolVersion>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the execution priority.
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set the origin filter.
    pub fn filter(mut self, filter: OriginFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Tag the hook with its owning module.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Outcome of registration normalization.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTarget {
    /// The table bucket the hook lands in.
    pub key: HookKey,
    /// Normalized message name, kept for diagnostics.
    pub label: String,
    /// The decode version a structured hook will use.
    pub version: ProtocolVersion,
}

/// Normalize a [`HookSpec`] against the codec's name registry.
///
/// Registration always succeeds structurally: an unresolvable name lands
/// the hook in the [`HookKey::Unknown`] bucket with a diagnostic, and a
/// numeric version on a structured wildcard hook is corrected to latest.
pub(crate) fn resolve_target(
    spec: &HookSpec,
    codec: &dyn ProtocolCodec,
    raw: bool,
    warn_implied: bool,
) -> ResolvedTarget {
    let label = normalize_name(&spec.message);

    let key = if label == WILDCARD {
        HookKey::Wildcard
    } else {
        match codec.opcode_of(&label) {
            Some(opcode) => HookKey::Opcode(opcode),
            None => {
                diag::report(&[
                    &format!("Cannot resolve message name '{label}' to an opcode"),
                    "The hook was parked on the unknown-opcode bucket and will never fire",
                ]);
                HookKey::Unknown
            }
        }
    };

    let mut version = match spec.version {
        Some(v) => v,
        None => {
            if !raw && warn_implied {
                warn!(
                    message = %label,
                    "Hook registered without an explicit schema version; implied latest is deprecated"
                );
            }
            ProtocolVersion::Latest
        }
    };

    if key == HookKey::Wildcard && !raw {
        if let ProtocolVersion::Exact(v) = version {
            warn!(
                version = v,
                "Wildcard hooks cannot request a numeric schema version; using latest"
            );
            version = ProtocolVersion::Latest;
        }
    }

    ResolvedTarget { key, label, version }
}
