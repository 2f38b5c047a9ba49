//! Packet travel direction.

use serde::{Deserialize, Serialize};

/// The direction a packet is travelling on the intercepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Observed from (or destined to look like it came from) the server.
    ServerToClient,
    /// Observed from (or destined to look like it came from) the client.
    ClientToServer,
}

impl Direction {
    /// Whether the packet originates on the server side.
    pub fn from_server(self) -> bool {
        matches!(self, Self::ServerToClient)
    }

    /// The opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Self::ServerToClient => Self::ClientToServer,
            Self::ClientToServer => Self::ServerToClient,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerToClient => write!(f, "server_to_client"),
            Self::ClientToServer => write!(f, "client_to_server"),
        }
    }
}
