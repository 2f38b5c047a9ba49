//! Schema version selection for structured decode/encode.

use serde::{Deserialize, Serialize};

/// Selects which revision of a message schema the codec should use.
///
/// Raw (undecoded) hooks bypass the codec entirely and therefore carry no
/// version selector; raw-ness is a property of the hook kind, not of this
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    /// A specific schema revision.
    Exact(u32),
    /// The newest revision the codec knows about.
    Latest,
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Latest => write!(f, "*"),
        }
    }
}

impl From<u32> for ProtocolVersion {
    fn from(v: u32) -> Self {
        Self::Exact(v)
    }
}
