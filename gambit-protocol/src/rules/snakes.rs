use super::{GameData, GameRules, Roll, RoundOutcome};

const FINAL_CELL: u8 = 100;

/// Multi-round Snakes & Ladders on the classic 100-cell board.
///
/// Both dice apply each round. A move past cell 100 is forfeited (exact
/// landing rule), so the only way to arrive is exactly; if both arrive in
/// the same round the session is a draw.
pub struct SnakesAndLadders;

impl GameRules for SnakesAndLadders {
    fn apply_round(&self, first: Roll, second: Roll, data: &mut GameData) -> RoundOutcome {
        advance(data, first);
        advance(data, second);

        let p1_home = data.position(first.player) == FINAL_CELL;
        let p2_home = data.position(second.player) == FINAL_CELL;

        match (p1_home, p2_home) {
            (true, true) => RoundOutcome::Draw,
            (true, false) => RoundOutcome::Winner(first.player),
            (false, true) => RoundOutcome::Winner(second.player),
            (false, false) => RoundOutcome::Continue,
        }
    }
}

fn advance(data: &mut GameData, roll: Roll) {
    let from = data.position(roll.player);
    let target = from.saturating_add(roll.die());
    let to = if target > FINAL_CELL {
        from
    } else {
        jump(target)
    };
    data.set_position(roll.player, to);
}

/// Classic board jump table.
fn jump(cell: u8) -> u8 {
    match cell {
        // ladders
        1 => 38,
        4 => 14,
        9 => 31,
        21 => 42,
        28 => 84,
        36 => 44,
        51 => 67,
        71 => 91,
        80 => 100,
        // snakes
        16 => 6,
        47 => 26,
        49 => 11,
        56 => 53,
        62 => 19,
        64 => 60,
        87 => 24,
        93 => 73,
        95 => 75,
        98 => 78,
        _ => cell,
    }
}
