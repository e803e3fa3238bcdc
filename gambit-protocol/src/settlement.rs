use crate::error::Result;
use crate::session::{GameSession, SessionState};
use gambit_core::{Amount, CoreError, PlayerId, ProtocolConfig};
use serde::{Deserialize, Serialize};

/// Why a payout line exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutReason {
    /// Winner's share of the pool.
    Winnings,
    /// Stake returned without a decision.
    Refund,
    /// Pool awarded to the responsive party after a stall.
    Forfeit,
    /// Protocol fee routed to the treasury.
    Fee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub account: PlayerId,
    pub amount: Amount,
    pub reason: PayoutReason,
}

/// The complete disbursement for one terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub payouts: Vec<Payout>,
}

impl Settlement {
    pub fn total(&self) -> Amount {
        self.payouts
            .iter()
            .fold(Amount::ZERO, |acc, p| acc.checked_add(p.amount).unwrap_or(acc))
    }

    pub fn paid_to(&self, account: PlayerId) -> Amount {
        self.payouts
            .iter()
            .filter(|p| p.account == account)
            .fold(Amount::ZERO, |acc, p| acc.checked_add(p.amount).unwrap_or(acc))
    }
}

/// Computes the payouts for a session that just reached a terminal state.
///
/// Pure function of the session snapshot; the registry applies the result
/// through custody exactly once, at the transition. Payouts never exceed
/// the funds escrowed for the session.
pub fn settle(session: &GameSession, config: &ProtocolConfig) -> Result<Settlement> {
    match session.state() {
        SessionState::Finished => settle_finished(session, config),
        SessionState::Expired => settle_expired(session, config),
        _ => Err(CoreError::internal("settlement on a live session").into()),
    }
}

fn settle_finished(session: &GameSession, config: &ProtocolConfig) -> Result<Settlement> {
    let stake = session.stake();
    let pool = stake.checked_mul(2).ok_or(CoreError::AmountOverflow)?;
    let fee = config.protocol_fee;

    let mut payouts = Vec::new();
    match session.winner() {
        Some(winner) => {
            let prize = pool.checked_sub(fee).ok_or(CoreError::AmountOverflow)?;
            payouts.push(Payout {
                account: winner,
                amount: prize,
                reason: PayoutReason::Winnings,
            });
            if !fee.is_zero() {
                payouts.push(Payout {
                    account: config.treasury,
                    amount: fee,
                    reason: PayoutReason::Fee,
                });
            }
        }
        None => {
            // Draw: both stakes back minus a pro-rated fee share.
            let player2 = session
                .player2()
                .ok_or_else(|| CoreError::internal("finished session without player2"))?;
            let refund = stake
                .checked_sub(fee.half())
                .ok_or(CoreError::AmountOverflow)?;
            payouts.push(Payout {
                account: session.player1(),
                amount: refund,
                reason: PayoutReason::Refund,
            });
            payouts.push(Payout {
                account: player2,
                amount: refund,
                reason: PayoutReason::Refund,
            });
            let fee_collected = pool.saturating_sub(refund.checked_mul(2).unwrap_or(pool));
            if !fee_collected.is_zero() {
                payouts.push(Payout {
                    account: config.treasury,
                    amount: fee_collected,
                    reason: PayoutReason::Fee,
                });
            }
        }
    }

    Ok(Settlement { payouts })
}

fn settle_expired(session: &GameSession, config: &ProtocolConfig) -> Result<Settlement> {
    let stake = session.stake();

    let player2 = match session.player2() {
        // Nobody joined: full refund of the only stake, no fee.
        None => {
            return Ok(Settlement {
                payouts: vec![Payout {
                    account: session.player1(),
                    amount: stake,
                    reason: PayoutReason::Refund,
                }],
            })
        }
        Some(p2) => p2,
    };

    // Stalled mid-game. The participant who got further through the current
    // round (reveal beats commitment beats nothing) takes the pool minus the
    // fee; equal progress refunds both stakes in full.
    let progress = |player: PlayerId| -> u8 {
        if session.has_revealed(player) {
            2
        } else if session.has_committed(player) {
            1
        } else {
            0
        }
    };
    let p1 = session.player1();
    let (s1, s2) = (progress(p1), progress(player2));

    if s1 == s2 {
        return Ok(Settlement {
            payouts: vec![
                Payout {
                    account: p1,
                    amount: stake,
                    reason: PayoutReason::Refund,
                },
                Payout {
                    account: player2,
                    amount: stake,
                    reason: PayoutReason::Refund,
                },
            ],
        });
    }

    let leader = if s1 > s2 { p1 } else { player2 };
    let pool = stake.checked_mul(2).ok_or(CoreError::AmountOverflow)?;
    let fee = config.protocol_fee;
    let prize = pool.checked_sub(fee).ok_or(CoreError::AmountOverflow)?;

    let mut payouts = vec![Payout {
        account: leader,
        amount: prize,
        reason: PayoutReason::Forfeit,
    }];
    if !fee.is_zero() {
        payouts.push(Payout {
            account: config.treasury,
            amount: fee,
            reason: PayoutReason::Fee,
        });
    }
    Ok(Settlement { payouts })
}
