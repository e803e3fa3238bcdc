//! Commit-reveal fair-play sessions for two-player staked board games
//!
//! A session walks Waiting -> InProgress -> Finished/Expired. Each
//! participant escrows the same fixed stake, commits to a hidden move,
//! then reveals it; the game rules decide the round and settlement pays
//! the pool out exactly once. Deadlines keep funds from being locked by
//! an unresponsive opponent.

pub mod commitment;
pub mod error;
pub mod events;
pub mod registry;
pub mod rules;
pub mod session;
pub mod settlement;
pub mod view;

pub use commitment::{compute_digest, generate_nonce, CommitmentDigest, MoveCommitment};
pub use error::{ProtocolError, Result};
pub use events::GameEvent;
pub use registry::GameRegistry;
pub use rules::{GameData, GameRules, GameType, Roll, RoundOutcome};
pub use session::{ExpiryKind, GameSession, RevealedMove, RoundResult, SessionState};
pub use settlement::{settle, Payout, PayoutReason, Settlement};
pub use view::SessionView;
