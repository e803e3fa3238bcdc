pub mod scheme;

pub use scheme::{CommitmentDigest, MoveCommitment};

use gambit_core::PlayerId;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Domain separator for move commitments.
const COMMITMENT_DOMAIN: &[u8] = b"GAMBIT_MOVE_COMMIT_V1";

/// Digest over the ordered (move, nonce, identity) tuple.
///
/// Binding the identity prevents replay by the other participant; binding
/// the nonce prevents enumerating the small move space against the digest.
pub fn compute_digest(value: u64, nonce: u64, player: PlayerId) -> CommitmentDigest {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(value.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.update(player.as_bytes());
    CommitmentDigest::new(hasher.finalize().to_vec())
}

/// Single-use blinding value with 64 bits of entropy.
pub fn generate_nonce() -> u64 {
    rand::thread_rng().next_u64()
}
