pub const GHOST_SPEED: f64 = 2.0;
pub const PLAYER_SPEED: f64 = 3.5;

pub const UNEATABLE_DURATION_MS: u64 = 10_000;
pub const EATABLE_DURATION_MS: u64 = 5_000;

pub const GHOST_EAT_BONUS: u32 = 100;
pub const STARTING_LIVES: u32 = 3;
pub const STARTING_SCORE: u32 = 0;

/// Probability that a ghost able to continue straight turns anyway.
pub const GHOST_TURN_CHANCE: f64 = 0.3;

pub const LOG_FILE_NAME: &str = "log.save";
pub const LOG_DELIMITER: &str = "--- LOG";
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

pub const COMMAND_QUEUE_DEPTH: usize = 256;

/// Tick period for a speed given in fields per second.
pub fn tick_period_ms(speed: f64) -> u64 {
    if speed <= 0.0 {
        return 1_000;
    }
    ((1000.0 / speed) as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_matches_default_speeds() {
        assert_eq!(tick_period_ms(GHOST_SPEED), 500);
        assert_eq!(tick_period_ms(PLAYER_SPEED), 285);
    }

    #[test]
    fn tick_period_never_degenerates() {
        assert_eq!(tick_period_ms(0.0), 1_000);
        assert_eq!(tick_period_ms(-3.0), 1_000);
        assert_eq!(tick_period_ms(1_000_000.0), 1);
    }
}
