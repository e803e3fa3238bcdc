pub mod ludo;
pub mod snakes;

pub use ludo::LudoLite;
pub use snakes::SnakesAndLadders;

use gambit_core::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Supported game variants. Fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    SnakesAndLadders,
    Ludo,
}

impl GameType {
    /// Rule strategy for this variant.
    pub fn rules(self) -> Box<dyn GameRules> {
        match self {
            GameType::SnakesAndLadders => Box::new(SnakesAndLadders),
            GameType::Ludo => Box::new(LudoLite),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::SnakesAndLadders => write!(f, "SnakesAndLadders"),
            GameType::Ludo => write!(f, "Ludo"),
        }
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snakes" | "snakesandladders" | "snakes-and-ladders" => Ok(GameType::SnakesAndLadders),
            "ludo" => Ok(GameType::Ludo),
            _ => Err(format!("unknown game type: {}", s)),
        }
    }
}

/// A revealed move attributed to a participant.
#[derive(Debug, Clone, Copy)]
pub struct Roll {
    pub player: PlayerId,
    pub value: u64,
}

impl Roll {
    /// Maps the committed value onto a die face.
    pub fn die(&self) -> u8 {
        (self.value % 6) as u8 + 1
    }
}

/// What a pair of reveals did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// No decision yet; the session re-enters the commit phase.
    Continue,
    Winner(PlayerId),
    Draw,
}

/// Board state evolved by the rules between rounds.
///
/// Cell 0 is the off-board start position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    positions: HashMap<PlayerId, u8>,
}

impl GameData {
    pub(crate) fn add_player(&mut self, player: PlayerId) {
        self.positions.insert(player, 0);
    }

    pub fn position(&self, player: PlayerId) -> u8 {
        self.positions.get(&player).copied().unwrap_or(0)
    }

    pub(crate) fn set_position(&mut self, player: PlayerId, cell: u8) {
        self.positions.insert(player, cell);
    }

    pub fn positions(&self) -> impl Iterator<Item = (PlayerId, u8)> + '_ {
        self.positions.iter().map(|(id, cell)| (*id, *cell))
    }
}

/// Game-specific decision function.
///
/// Consumes both revealed moves for the round and the evolving board state,
/// and reports whether the session continues or settles.
pub trait GameRules: Send + Sync {
    fn apply_round(&self, first: Roll, second: Roll, data: &mut GameData) -> RoundOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_die_mapping_stays_in_range() {
        let player = PlayerId::new_v4();
        for value in [0u64, 1, 5, 6, 7, 100, u64::MAX] {
            let die = Roll { player, value }.die();
            assert!((1..=6).contains(&die), "value {} -> die {}", value, die);
        }
    }

    #[test]
    fn test_game_type_parsing() {
        assert_eq!(
            "snakes".parse::<GameType>().unwrap(),
            GameType::SnakesAndLadders
        );
        assert_eq!("Ludo".parse::<GameType>().unwrap(), GameType::Ludo);
        assert!("chess".parse::<GameType>().is_err());
    }
}
