use super::{GameData, GameRules, Roll, RoundOutcome};

/// Single-round Ludo variant: one die each, higher face takes the pool.
///
/// Equal faces are a draw and both stakes are refunded at settlement.
pub struct LudoLite;

impl GameRules for LudoLite {
    fn apply_round(&self, first: Roll, second: Roll, data: &mut GameData) -> RoundOutcome {
        let d1 = first.die();
        let d2 = second.die();

        // Track token advancement for display.
        data.set_position(first.player, data.position(first.player).saturating_add(d1));
        data.set_position(second.player, data.position(second.player).saturating_add(d2));

        match d1.cmp(&d2) {
            std::cmp::Ordering::Greater => RoundOutcome::Winner(first.player),
            std::cmp::Ordering::Less => RoundOutcome::Winner(second.player),
            std::cmp::Ordering::Equal => RoundOutcome::Draw,
        }
    }
}
