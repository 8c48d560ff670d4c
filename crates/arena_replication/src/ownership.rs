//! Peers, authority, and entity ownership.

use arena_ecs::Component;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::ReplicationMode;

/// A connected peer's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub Uuid);

impl PeerId {
    /// A fresh random peer id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Who this simulation instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// The authoritative server simulation.
    Server,
    /// A predicting client simulation for one peer.
    Client(PeerId),
}

impl Authority {
    /// Returns `true` if this instance is the server.
    #[must_use]
    pub fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }

    /// Whether this instance may simulate writes to a component with the
    /// given mode on an entity owned by `owner`.
    ///
    /// The server writes everything. A client only writes predicted state of
    /// entities it owns; always-replicated and interpolated fields arrive
    /// from the server and are never simulated locally.
    #[must_use]
    pub fn can_write(self, mode: ReplicationMode, owner: Option<PeerId>) -> bool {
        match self {
            Self::Server => true,
            Self::Client(peer) => {
                mode == ReplicationMode::PredictedCorrectable && owner == Some(peer)
            }
        }
    }
}

/// Component marking which peer owns (and predicts) an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// The owning peer.
    pub peer: PeerId,
}

impl Component for Owner {
    fn type_name() -> &'static str {
        "Owner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_writes_everything() {
        for mode in [
            ReplicationMode::AlwaysReplicated,
            ReplicationMode::PredictedCorrectable,
            ReplicationMode::InterpolatedVisualOnly,
        ] {
            assert!(Authority::Server.can_write(mode, None));
        }
    }

    #[test]
    fn test_client_writes_only_owned_predicted_state() {
        let me = PeerId::random();
        let other = PeerId::random();
        let client = Authority::Client(me);

        assert!(client.can_write(ReplicationMode::PredictedCorrectable, Some(me)));
        assert!(!client.can_write(ReplicationMode::PredictedCorrectable, Some(other)));
        assert!(!client.can_write(ReplicationMode::PredictedCorrectable, None));
        assert!(!client.can_write(ReplicationMode::AlwaysReplicated, Some(me)));
        assert!(!client.can_write(ReplicationMode::InterpolatedVisualOnly, Some(me)));
    }
}
