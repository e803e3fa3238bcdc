use crate::error::{CoreError, Result};
use crate::types::{Amount, PlayerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol-wide constants fixed before any session is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Stake each participant escrows to enter a session.
    pub stake: Amount,
    /// Fee routed to the treasury on a decided or forfeited session.
    pub protocol_fee: Amount,
    /// How long a Waiting session may sit without a second player.
    pub join_timeout: Duration,
    /// How long an InProgress session may sit without a commit or reveal.
    pub move_timeout: Duration,
    /// Account receiving protocol fees.
    pub treasury: PlayerId,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            // 0.01 unit per player, 0.001 fee on the 0.02 pool
            stake: Amount::from_base(10_000_000),
            protocol_fee: Amount::from_base(1_000_000),
            join_timeout: Duration::from_secs(600),
            move_timeout: Duration::from_secs(300),
            treasury: PlayerId::nil(),
        }
    }
}

impl ProtocolConfig {
    pub fn with_treasury(treasury: PlayerId) -> Self {
        Self {
            treasury,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stake.is_zero() {
            return Err(CoreError::config("stake must be greater than 0"));
        }
        if self.stake.checked_mul(2).is_none() {
            return Err(CoreError::config("stake too large"));
        }
        if self.protocol_fee >= self.stake {
            return Err(CoreError::config("protocol fee must be below the stake"));
        }
        if !self.protocol_fee.is_zero() && self.treasury.is_nil() {
            return Err(CoreError::config(
                "a treasury account is required when the protocol fee is non-zero",
            ));
        }
        if self.join_timeout.is_zero() || self.move_timeout.is_zero() {
            return Err(CoreError::config("timeouts must be greater than 0"));
        }
        Ok(())
    }
}
