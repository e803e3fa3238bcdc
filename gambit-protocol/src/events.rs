use crate::rules::GameType;
use gambit_core::PlayerId;
use serde::{Deserialize, Serialize};

/// Asynchronous notifications of session state transitions.
///
/// Broadcast by the registry after the transition (and any settlement) has
/// been applied; subscribers re-query for full session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    GameCreated {
        id: u64,
        game_type: GameType,
        player1: PlayerId,
    },
    PlayerJoined {
        id: u64,
        player2: PlayerId,
    },
    GameFinished {
        id: u64,
        winner: Option<PlayerId>,
    },
    GameExpired {
        id: u64,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> u64 {
        match self {
            GameEvent::GameCreated { id, .. }
            | GameEvent::PlayerJoined { id, .. }
            | GameEvent::GameFinished { id, .. }
            | GameEvent::GameExpired { id } => *id,
        }
    }
}
