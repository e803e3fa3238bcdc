use crate::rules::GameType;
use crate::session::{GameSession, SessionState};
use crate::settlement::Payout;
use chrono::{DateTime, Utc};
use gambit_core::{Amount, PlayerId};
use serde::Serialize;

/// Display-ready projection of a session snapshot.
///
/// Pure function of the snapshot; front ends render this instead of poking
/// at the session entity.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: u64,
    pub game_type: GameType,
    pub state: SessionState,
    pub stake: Amount,
    pub player1: PlayerId,
    pub player2: Option<PlayerId>,
    pub round: u32,
    pub committed: Vec<PlayerId>,
    pub revealed: Vec<PlayerId>,
    pub positions: Vec<(PlayerId, u8)>,
    pub winner: Option<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub last_action_time: DateTime<Utc>,
    pub payouts: Vec<Payout>,
}

impl From<&GameSession> for SessionView {
    fn from(session: &GameSession) -> Self {
        let participants: Vec<PlayerId> = std::iter::once(session.player1())
            .chain(session.player2())
            .collect();

        let committed = participants
            .iter()
            .copied()
            .filter(|p| session.has_committed(*p))
            .collect();
        let revealed = participants
            .iter()
            .copied()
            .filter(|p| session.has_revealed(*p))
            .collect();
        let positions = participants
            .iter()
            .map(|p| (*p, session.game_data().position(*p)))
            .collect();

        Self {
            id: session.id(),
            game_type: session.game_type(),
            state: session.state(),
            stake: session.stake(),
            player1: session.player1(),
            player2: session.player2(),
            round: session.round(),
            committed,
            revealed,
            positions,
            winner: session.winner(),
            created_at: session.created_at(),
            last_action_time: session.last_action_time(),
            payouts: session
                .settlement()
                .map(|s| s.payouts.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gambit_core::ProtocolConfig;

    #[test]
    fn test_projection_tracks_participants_in_order() {
        let cfg = ProtocolConfig::with_treasury(PlayerId::new_v4());
        let now = Utc::now();
        let p1 = PlayerId::new_v4();
        let p2 = PlayerId::new_v4();
        let mut session = GameSession::new(9, GameType::SnakesAndLadders, p1, cfg.stake, now);

        let view = SessionView::from(&session);
        assert_eq!(view.id, 9);
        assert_eq!(view.state, SessionState::Waiting);
        assert_eq!(view.positions, vec![(p1, 0)]);
        assert!(view.committed.is_empty());

        session.join(p2, cfg.stake, now).unwrap();
        let view = SessionView::from(&session);
        assert_eq!(view.player2, Some(p2));
        assert_eq!(view.positions, vec![(p1, 0), (p2, 0)]);
    }
}
