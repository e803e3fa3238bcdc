use gambit_core::{Amount, CoreError, PlayerId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Invalid stake: expected {expected}, got {got}")]
    InvalidStake { expected: Amount, got: Amount },

    #[error("Session already has a second player")]
    AlreadyJoined,

    #[error("Creator cannot join their own session")]
    SelfJoin,

    #[error("Not a participant: {0}")]
    NotParticipant(PlayerId),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Commitment already submitted")]
    DuplicateCommitment,

    #[error("Move already revealed")]
    DuplicateReveal,

    #[error("No commitment stored for this participant")]
    MissingCommitment,

    #[error("Reveal does not match the stored commitment")]
    InvalidReveal,

    #[error("Session is already terminal")]
    AlreadyTerminal,

    #[error("Deadline has not elapsed yet")]
    NotYetExpirable,
}

impl ProtocolError {
    /// Protocol violations are rejected like validation errors but are
    /// surfaced separately for anti-cheat telemetry.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::DuplicateCommitment
                | ProtocolError::DuplicateReveal
                | ProtocolError::MissingCommitment
                | ProtocolError::InvalidReveal
                | ProtocolError::AlreadyTerminal
        )
    }
}
