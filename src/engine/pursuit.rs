use rand::Rng;

use crate::constants::GHOST_TURN_CHANCE;
use crate::types::Direction;

/// Picks a ghost's next facing direction.
///
/// A ghost keeps going straight while it can, turning off 30% of the time,
/// and only reverses when nothing else is open.
pub fn choose_direction<R: Rng>(
    current: Direction,
    available: &[Direction],
    rng: &mut R,
) -> Direction {
    let reverse = current.opposite();
    if !available.contains(&current) {
        let mut candidates: Vec<Direction> = available.to_vec();
        if candidates.len() > 1 {
            candidates.retain(|dir| *dir != reverse);
        }
        if candidates.is_empty() {
            return reverse;
        }
        return candidates[rng.random_range(0..candidates.len())];
    }

    if !rng.random_bool(GHOST_TURN_CHANCE) {
        return current;
    }
    let turns: Vec<Direction> = available
        .iter()
        .copied()
        .filter(|dir| *dir != current && *dir != reverse)
        .collect();
    if turns.is_empty() {
        return current;
    }
    turns[rng.random_range(0..turns.len())]
}
