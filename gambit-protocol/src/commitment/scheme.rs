use chrono::{DateTime, Utc};
use gambit_core::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binding, hiding digest of a (move, nonce, identity) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentDigest(Vec<u8>);

impl CommitmentDigest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CommitmentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// A commitment stored in a game session.
///
/// Immutable once stored; at most one per participant per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveCommitment {
    digest: CommitmentDigest,
    player: PlayerId,
    submitted_at: DateTime<Utc>,
}

impl MoveCommitment {
    pub fn new(digest: CommitmentDigest, player: PlayerId, submitted_at: DateTime<Utc>) -> Self {
        Self {
            digest,
            player,
            submitted_at,
        }
    }

    pub fn digest(&self) -> &CommitmentDigest {
        &self.digest
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Recomputes the digest from the revealed values and requires equality.
    pub fn verify(&self, value: u64, nonce: u64, player: PlayerId) -> bool {
        player == self.player && super::compute_digest(value, nonce, player) == self.digest
    }
}
