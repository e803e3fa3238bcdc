use crate::commitment::{CommitmentDigest, MoveCommitment};
use crate::error::{ProtocolError, Result};
use crate::rules::{GameData, GameRules, GameType, Roll, RoundOutcome};
use crate::settlement::Settlement;
use chrono::{DateTime, Utc};
use gambit_core::{Amount, PlayerId, ProtocolConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Session lifecycle. Transitions are monotonic; `Finished` and `Expired`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Waiting,
    InProgress,
    Finished,
    Expired,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Expired)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Waiting => write!(f, "Waiting"),
            SessionState::InProgress => write!(f, "InProgress"),
            SessionState::Finished => write!(f, "Finished"),
            SessionState::Expired => write!(f, "Expired"),
        }
    }
}

/// A revealed (move, nonce) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedMove {
    pub value: u64,
    pub nonce: u64,
    pub revealed_at: DateTime<Utc>,
}

/// What a reveal did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResult {
    /// Recorded; waiting for the other participant.
    AwaitingOpponent,
    /// Both revealed and the rules continued the session into a new round.
    NextRound,
    /// Session reached `Finished`.
    Finished { winner: Option<PlayerId> },
}

/// Which deadline produced an expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryKind {
    /// No second player ever joined.
    NeverJoined,
    /// Stalled mid-game past the move deadline.
    Stalled,
}

/// One two-player staked game governed by the commit-reveal state machine.
///
/// Sessions are mutated only through the registry, which serializes all
/// operations; every rejected call leaves the session untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    id: u64,
    game_type: GameType,
    player1: PlayerId,
    player2: Option<PlayerId>,
    state: SessionState,
    stake: Amount,
    commitments: HashMap<PlayerId, MoveCommitment>,
    reveals: HashMap<PlayerId, RevealedMove>,
    created_at: DateTime<Utc>,
    last_action_time: DateTime<Utc>,
    winner: Option<PlayerId>,
    round: u32,
    game_data: GameData,
    settlement: Option<Settlement>,
}

impl GameSession {
    pub(crate) fn new(
        id: u64,
        game_type: GameType,
        player1: PlayerId,
        stake: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        let mut game_data = GameData::default();
        game_data.add_player(player1);

        Self {
            id,
            game_type,
            player1,
            player2: None,
            state: SessionState::Waiting,
            stake,
            commitments: HashMap::new(),
            reveals: HashMap::new(),
            created_at: now,
            last_action_time: now,
            winner: None,
            round: 1,
            game_data,
            settlement: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn player1(&self) -> PlayerId {
        self.player1
    }

    pub fn player2(&self) -> Option<PlayerId> {
        self.player2
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stake(&self) -> Amount {
        self.stake
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_action_time(&self) -> DateTime<Utc> {
        self.last_action_time
    }

    pub fn game_data(&self) -> &GameData {
        &self.game_data
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_participant(&self, player: PlayerId) -> bool {
        player == self.player1 || self.player2 == Some(player)
    }

    pub fn has_committed(&self, player: PlayerId) -> bool {
        self.commitments.contains_key(&player)
    }

    pub fn has_revealed(&self, player: PlayerId) -> bool {
        self.reveals.contains_key(&player)
    }

    /// Funds currently escrowed for this session.
    pub fn escrowed(&self) -> Amount {
        let stakes = if self.player2.is_some() { 2 } else { 1 };
        self.stake.checked_mul(stakes).unwrap_or(Amount::ZERO)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(ProtocolError::AlreadyTerminal);
        }
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<()> {
        self.ensure_live()?;
        if self.state != SessionState::InProgress {
            return Err(ProtocolError::InvalidState(
                "session has not started".to_string(),
            ));
        }
        Ok(())
    }

    /// Join guards without the transition, so the registry can escrow the
    /// stake between validation and mutation.
    pub(crate) fn ensure_joinable(&self, player: PlayerId, stake: Amount) -> Result<()> {
        self.ensure_live()?;
        if self.player2.is_some() || self.state != SessionState::Waiting {
            return Err(ProtocolError::AlreadyJoined);
        }
        if player == self.player1 {
            return Err(ProtocolError::SelfJoin);
        }
        if stake != self.stake {
            return Err(ProtocolError::InvalidStake {
                expected: self.stake,
                got: stake,
            });
        }
        Ok(())
    }

    /// Waiting -> InProgress.
    pub(crate) fn join(
        &mut self,
        player: PlayerId,
        stake: Amount,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_joinable(player, stake)?;

        self.player2 = Some(player);
        self.game_data.add_player(player);
        self.state = SessionState::InProgress;
        self.last_action_time = now;

        tracing::info!("Player {} joined game {}", player, self.id);
        Ok(())
    }

    /// Records a commitment. The session stays InProgress.
    pub(crate) fn commit_move(
        &mut self,
        player: PlayerId,
        digest: CommitmentDigest,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_in_progress()?;
        if !self.is_participant(player) {
            return Err(ProtocolError::NotParticipant(player));
        }
        if self.commitments.contains_key(&player) {
            return Err(ProtocolError::DuplicateCommitment);
        }

        self.commitments
            .insert(player, MoveCommitment::new(digest, player, now));
        self.last_action_time = now;

        tracing::info!(
            "Player {} committed in game {} round {}",
            player,
            self.id,
            self.round
        );
        Ok(())
    }

    /// Records a reveal; once both participants have revealed, the rules
    /// decide whether the session finishes or re-enters the commit phase.
    pub(crate) fn reveal_move(
        &mut self,
        player: PlayerId,
        value: u64,
        nonce: u64,
        rules: &dyn GameRules,
        now: DateTime<Utc>,
    ) -> Result<RoundResult> {
        self.ensure_in_progress()?;
        if !self.is_participant(player) {
            return Err(ProtocolError::NotParticipant(player));
        }
        let commitment = self
            .commitments
            .get(&player)
            .ok_or(ProtocolError::MissingCommitment)?;
        if self.reveals.contains_key(&player) {
            return Err(ProtocolError::DuplicateReveal);
        }
        if !commitment.verify(value, nonce, player) {
            return Err(ProtocolError::InvalidReveal);
        }

        self.reveals.insert(
            player,
            RevealedMove {
                value,
                nonce,
                revealed_at: now,
            },
        );
        self.last_action_time = now;

        tracing::info!(
            "Player {} revealed in game {} round {}",
            player,
            self.id,
            self.round
        );

        let player2 = match self.player2 {
            Some(p2) => p2,
            None => return Err(ProtocolError::InvalidState("no second player".to_string())),
        };
        let (value1, value2) = match (self.reveals.get(&self.player1), self.reveals.get(&player2))
        {
            (Some(r1), Some(r2)) => (r1.value, r2.value),
            _ => return Ok(RoundResult::AwaitingOpponent),
        };

        let outcome = rules.apply_round(
            Roll {
                player: self.player1,
                value: value1,
            },
            Roll {
                player: player2,
                value: value2,
            },
            &mut self.game_data,
        );

        match outcome {
            RoundOutcome::Continue => {
                self.round += 1;
                self.commitments.clear();
                self.reveals.clear();
                tracing::info!("Game {} continues into round {}", self.id, self.round);
                Ok(RoundResult::NextRound)
            }
            RoundOutcome::Winner(winner) => {
                self.state = SessionState::Finished;
                self.winner = Some(winner);
                tracing::info!("Game {} finished, winner {}", self.id, winner);
                Ok(RoundResult::Finished {
                    winner: Some(winner),
                })
            }
            RoundOutcome::Draw => {
                self.state = SessionState::Finished;
                tracing::info!("Game {} finished in a draw", self.id);
                Ok(RoundResult::Finished { winner: None })
            }
        }
    }

    /// Forces a stalled session into `Expired` once its deadline elapsed.
    pub(crate) fn expire(&mut self, now: DateTime<Utc>, config: &ProtocolConfig) -> Result<ExpiryKind> {
        self.ensure_live()?;

        let kind = match self.state {
            SessionState::Waiting => {
                if !deadline_elapsed(self.created_at, now, config.join_timeout) {
                    return Err(ProtocolError::NotYetExpirable);
                }
                ExpiryKind::NeverJoined
            }
            SessionState::InProgress => {
                if !deadline_elapsed(self.last_action_time, now, config.move_timeout) {
                    return Err(ProtocolError::NotYetExpirable);
                }
                ExpiryKind::Stalled
            }
            SessionState::Finished | SessionState::Expired => {
                return Err(ProtocolError::AlreadyTerminal)
            }
        };

        self.state = SessionState::Expired;
        self.last_action_time = now;
        tracing::warn!("Game {} expired ({:?})", self.id, kind);
        Ok(kind)
    }

    pub(crate) fn record_settlement(&mut self, settlement: Settlement) {
        self.settlement = Some(settlement);
    }
}

fn deadline_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
    now.signed_duration_since(since)
        .to_std()
        .map(|elapsed| elapsed > timeout)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::compute_digest;
    use chrono::Duration;

    fn config() -> ProtocolConfig {
        ProtocolConfig::with_treasury(PlayerId::new_v4())
    }

    fn session(now: DateTime<Utc>) -> (GameSession, PlayerId, PlayerId) {
        let cfg = config();
        let p1 = PlayerId::new_v4();
        let p2 = PlayerId::new_v4();
        let session = GameSession::new(1, GameType::Ludo, p1, cfg.stake, now);
        (session, p1, p2)
    }

    fn commit_and_reveal(
        session: &mut GameSession,
        player: PlayerId,
        value: u64,
        nonce: u64,
        now: DateTime<Utc>,
    ) -> Result<RoundResult> {
        session.commit_move(player, compute_digest(value, nonce, player), now)?;
        session.reveal_move(player, value, nonce, GameType::Ludo.rules().as_ref(), now)
    }

    #[test]
    fn test_join_transitions_to_in_progress() {
        let now = Utc::now();
        let (mut session, _p1, p2) = session(now);
        assert_eq!(session.state(), SessionState::Waiting);

        session.join(p2, session.stake(), now).unwrap();
        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(session.player2(), Some(p2));
    }

    #[test]
    fn test_join_guards() {
        let now = Utc::now();
        let (mut session, p1, p2) = session(now);
        let stake = session.stake();

        assert!(matches!(
            session.join(p1, stake, now).unwrap_err(),
            ProtocolError::SelfJoin
        ));
        assert!(matches!(
            session
                .join(p2, Amount::from_base(stake.to_base() + 1), now)
                .unwrap_err(),
            ProtocolError::InvalidStake { .. }
        ));

        session.join(p2, stake, now).unwrap();
        let p3 = PlayerId::new_v4();
        assert!(matches!(
            session.join(p3, stake, now).unwrap_err(),
            ProtocolError::AlreadyJoined
        ));
    }

    #[test]
    fn test_commit_requires_in_progress() {
        let now = Utc::now();
        let (mut session, p1, _p2) = session(now);
        let digest = compute_digest(1, 2, p1);
        assert!(matches!(
            session.commit_move(p1, digest, now).unwrap_err(),
            ProtocolError::InvalidState(_)
        ));
    }

    #[test]
    fn test_duplicate_commitment_rejected() {
        let now = Utc::now();
        let (mut session, p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();

        let digest = compute_digest(1, 2, p1);
        session.commit_move(p1, digest.clone(), now).unwrap();
        assert!(matches!(
            session.commit_move(p1, digest, now).unwrap_err(),
            ProtocolError::DuplicateCommitment
        ));
    }

    #[test]
    fn test_outsider_cannot_commit() {
        let now = Utc::now();
        let (mut session, _p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();

        let outsider = PlayerId::new_v4();
        let digest = compute_digest(1, 2, outsider);
        assert!(matches!(
            session.commit_move(outsider, digest, now).unwrap_err(),
            ProtocolError::NotParticipant(_)
        ));
    }

    #[test]
    fn test_reveal_requires_commitment() {
        let now = Utc::now();
        let (mut session, p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();

        let rules = GameType::Ludo.rules();
        assert!(matches!(
            session.reveal_move(p1, 1, 2, rules.as_ref(), now).unwrap_err(),
            ProtocolError::MissingCommitment
        ));
    }

    #[test]
    fn test_mismatched_reveal_rejected_without_state_change() {
        let now = Utc::now();
        let (mut session, p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();
        session
            .commit_move(p1, compute_digest(5, 123, p1), now)
            .unwrap();

        let rules = GameType::Ludo.rules();
        let err = session
            .reveal_move(p1, 6, 123, rules.as_ref(), now)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidReveal));
        assert_eq!(session.state(), SessionState::InProgress);
        assert!(!session.has_revealed(p1));

        // matching reveal still goes through afterwards
        let result = session.reveal_move(p1, 5, 123, rules.as_ref(), now).unwrap();
        assert_eq!(result, RoundResult::AwaitingOpponent);
    }

    #[test]
    fn test_both_reveals_finish_single_round_game() {
        let now = Utc::now();
        let (mut session, p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();

        // die 5 vs die 3
        let result = commit_and_reveal(&mut session, p1, 4, 11, now).unwrap();
        assert_eq!(result, RoundResult::AwaitingOpponent);
        let result = commit_and_reveal(&mut session, p2, 2, 22, now).unwrap();
        assert_eq!(result, RoundResult::Finished { winner: Some(p1) });
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.winner(), Some(p1));
    }

    #[test]
    fn test_multi_round_snakes_session_re_enters_commit_phase() {
        let now = Utc::now();
        let cfg = config();
        let p1 = PlayerId::new_v4();
        let p2 = PlayerId::new_v4();
        let mut session = GameSession::new(1, GameType::SnakesAndLadders, p1, cfg.stake, now);
        session.join(p2, cfg.stake, now).unwrap();

        let rules = GameType::SnakesAndLadders.rules();
        session
            .commit_move(p1, compute_digest(1, 1, p1), now)
            .unwrap();
        session
            .commit_move(p2, compute_digest(2, 2, p2), now)
            .unwrap();
        session.reveal_move(p1, 1, 1, rules.as_ref(), now).unwrap();
        let result = session.reveal_move(p2, 2, 2, rules.as_ref(), now).unwrap();

        assert_eq!(result, RoundResult::NextRound);
        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(session.round(), 2);
        assert!(!session.has_committed(p1));
        assert!(!session.has_revealed(p1));
    }

    #[test]
    fn test_terminal_sessions_reject_everything() {
        let now = Utc::now();
        let (mut session, p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();
        commit_and_reveal(&mut session, p1, 4, 11, now).unwrap();
        commit_and_reveal(&mut session, p2, 2, 22, now).unwrap();
        assert!(session.is_terminal());

        let cfg = config();
        assert!(matches!(
            session
                .commit_move(p1, compute_digest(1, 1, p1), now)
                .unwrap_err(),
            ProtocolError::AlreadyTerminal
        ));
        assert!(matches!(
            session.expire(now + Duration::days(1), &cfg).unwrap_err(),
            ProtocolError::AlreadyTerminal
        ));
    }

    #[test]
    fn test_expire_waiting_after_join_timeout() {
        let now = Utc::now();
        let cfg = config();
        let (mut session, _p1, _p2) = session(now);

        assert!(matches!(
            session.expire(now, &cfg).unwrap_err(),
            ProtocolError::NotYetExpirable
        ));

        let later = now + Duration::from_std(cfg.join_timeout).unwrap() + Duration::seconds(1);
        assert_eq!(session.expire(later, &cfg).unwrap(), ExpiryKind::NeverJoined);
        assert_eq!(session.state(), SessionState::Expired);
    }

    #[test]
    fn test_expire_stalled_mid_game() {
        let now = Utc::now();
        let cfg = config();
        let (mut session, p1, p2) = session(now);
        session.join(p2, session.stake(), now).unwrap();
        session
            .commit_move(p1, compute_digest(5, 9, p1), now)
            .unwrap();

        let too_early = now + Duration::seconds(10);
        assert!(matches!(
            session.expire(too_early, &cfg).unwrap_err(),
            ProtocolError::NotYetExpirable
        ));

        let later = now + Duration::from_std(cfg.move_timeout).unwrap() + Duration::seconds(1);
        assert_eq!(session.expire(later, &cfg).unwrap(), ExpiryKind::Stalled);
        assert_eq!(session.state(), SessionState::Expired);
    }
}
