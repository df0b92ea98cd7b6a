use super::*;
use crate::event_log::LogRecord;
use crate::world::EntityState;

use super::pursuit::choose_direction;

impl GameEngine {
    /// Applies one tick from `actor`. Ticks that do not belong to the
    /// current state are dropped.
    pub fn tick(&mut self, actor: Actor) -> GameResult<()> {
        if self.fault.is_some() {
            return Ok(());
        }
        match (actor, self.state) {
            (Actor::Replay, GameState::Replay | GameState::ReplayReverse) => self.replay_step(),
            (Actor::Replay, _) => Ok(()),
            (_, GameState::Default) => self.live_tick(actor),
            _ => Ok(()),
        }
    }

    fn live_tick(&mut self, actor: Actor) -> GameResult<()> {
        let before = self.world.mover_states();
        let start_field = self.world.player().field;

        let (cleared_point, mut outcome) = match actor {
            Actor::Player => self.advance_player(),
            Actor::Ghosts => self.advance_ghosts(),
            Actor::Eatable(eatable) => {
                self.set_ghosts_eatable(eatable);
                (false, None)
            }
            Actor::Replay => (false, None),
        };

        let field = self.world.player().field;
        if field != start_field {
            self.world.collect_keys_at(field);
            if outcome.is_none() && self.world.can_complete() {
                outcome = Some(GameOverReason::Completed);
            }
        }

        let records = self.changed_records(&before, cleared_point);
        if let Some(log) = self.log.as_mut() {
            log.append(&records)?;
        }
        self.publish_world_events();

        match outcome {
            Some(reason) => self.end_session(reason),
            None => Ok(()),
        }
    }

    fn advance_player(&mut self) -> (bool, Option<GameOverReason>) {
        let dir = self.world.player().dir;
        if dir == Direction::None {
            return (false, None);
        }
        let report = self.world.move_entity(EntityId::Player, dir);
        (report.cleared_point, report.outcome)
    }

    /// Every ghost picks a direction and tries it, in index order.
    fn advance_ghosts(&mut self) -> (bool, Option<GameOverReason>) {
        for idx in 0..self.world.ghosts().len() {
            let entity = EntityId::Ghost(idx);
            let current = self.world.ghosts()[idx].dir;
            let available = self.world.available_directions(entity);
            let dir = choose_direction(current, &available, &mut self.rng);
            self.world.set_direction(entity, dir);
            let report = self.world.move_entity(entity, dir);
            if report.outcome.is_some() {
                return (false, report.outcome);
            }
        }
        (false, None)
    }

    fn set_ghosts_eatable(&mut self, eatable: bool) {
        log::debug!("ghosts eatable: {eatable}");
        for idx in 0..self.world.ghosts().len() {
            self.world.set_eatable(idx, eatable);
        }
    }

    /// One record per mover whose logged state changed this tick.
    fn changed_records(
        &self,
        before: &[(EntityId, EntityState)],
        cleared_point: bool,
    ) -> Vec<LogRecord> {
        self.world
            .mover_states()
            .into_iter()
            .zip(before)
            .filter_map(|((entity, after), (_, previous))| {
                let player_left_point = entity == EntityId::Player && cleared_point;
                if after == *previous && !player_left_point {
                    return None;
                }
                let at = self.world.coord(after.field());
                match (entity, after) {
                    (EntityId::Player, EntityState::Player { score, lives, .. }) => {
                        Some(LogRecord::Player {
                            at,
                            score,
                            lives,
                            left_point: cleared_point,
                        })
                    }
                    (EntityId::Ghost(index), EntityState::Ghost { eatable, .. }) => {
                        Some(LogRecord::Ghost { index, at, eatable })
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::super::test_support::engine_on;
    use super::*;
    use crate::event_log::EventLog;
    use crate::types::Coord;

    fn recorded(engine: &mut GameEngine) -> EventLog {
        engine.close().expect("log closes");
        EventLog::load(&engine.config().log_path).expect("log parses")
    }

    #[test]
    fn player_tick_moves_eats_point_and_records() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("1 4\nS..X\n", dir.path());
        engine.set_player_direction(Direction::Right);
        engine.tick(Actor::Player).expect("tick");
        engine.tick(Actor::Player).expect("tick");
        engine.tick(Actor::Player).expect("blocked tick");

        let world = engine.world();
        assert_eq!(world.coord(world.player().field), Coord::new(1, 3));
        assert!(!world.maze().field_at(Coord::new(1, 1)).expect("field").point);
        assert!(!world.maze().field_at(Coord::new(1, 2)).expect("field").point);
        assert!(world.maze().field_at(Coord::new(1, 3)).expect("field").point);

        let log = recorded(&mut engine);
        assert_eq!(log.ticks.len(), 2);
        assert_eq!(
            log.ticks[1].entries[0].record,
            LogRecord::Player {
                at: Coord::new(1, 3),
                score: 0,
                lives: 3,
                left_point: true,
            }
        );
    }

    #[test]
    fn idle_ticks_write_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("1 2\nS.\n", dir.path());
        engine.tick(Actor::Player).expect("tick");
        engine.tick(Actor::Ghosts).expect("tick");
        engine.tick(Actor::Eatable(false)).expect("tick");
        let log = recorded(&mut engine);
        assert!(log.ticks.is_empty());
    }

    #[test]
    fn eatable_window_is_logged_per_ghost() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("1 4\nSXGG\n", dir.path());
        engine.tick(Actor::Eatable(true)).expect("tick");
        assert!(engine.world().ghosts().iter().all(|ghost| ghost.eatable));
        assert!(matches!(
            engine.actor_plan(),
            ActorPlan::Live {
                eatable_now: true,
                ..
            }
        ));
        let log = recorded(&mut engine);
        let records: Vec<String> = log.ticks[0]
            .entries
            .iter()
            .map(|entry| entry.record.to_string())
            .collect();
        assert_eq!(records, vec!["G0 1/3 true", "G1 1/4 true"]);
    }

    #[test]
    fn reaching_goal_with_every_key_completes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("1 3\nSKT\n", dir.path());
        engine.set_player_direction(Direction::Right);
        engine.tick(Actor::Player).expect("tick");
        assert!(engine.world().keys()[0].collected);
        assert_eq!(engine.state(), GameState::Default);
        engine.tick(Actor::Player).expect("tick");
        assert_eq!(engine.state(), GameState::Ended(GameOverReason::Completed));
        assert!(!engine.is_recording());
        assert_eq!(engine.actor_plan(), ActorPlan::Idle);

        let text = fs::read_to_string(dir.path().join("log.save")).expect("log exists");
        assert!(text.ends_with("P 1/3 0 3 p\n"), "{text}");
    }

    #[test]
    fn goal_without_keys_does_not_complete() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("2 2\nST\nK.\n", dir.path());
        engine.set_player_direction(Direction::Right);
        engine.tick(Actor::Player).expect("tick");
        assert_eq!(engine.state(), GameState::Default);
    }

    #[test]
    fn corridor_collision_costs_a_life() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("1 2\nSG\n", dir.path());
        engine.set_player_direction(Direction::Right);
        engine.tick(Actor::Player).expect("tick");

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.player.lives, 2);
        assert_eq!(snapshot.player.score, 0);
        assert_eq!(snapshot.player.at, snapshot.player.start);
        assert_eq!(snapshot.ghosts[0].at, snapshot.ghosts[0].start);
        assert_eq!(engine.state(), GameState::Default);
        assert!(engine.world().occupancy_consistent());

        engine.tick(Actor::Player).expect("tick");
        engine.tick(Actor::Player).expect("tick");
        assert_eq!(engine.state(), GameState::Ended(GameOverReason::Lost));
        assert_eq!(engine.snapshot().player.lives, 0);
    }

    #[test]
    fn paused_engine_ignores_ticks() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut engine = engine_on("1 3\nS.G\n", dir.path());
        engine.set_player_direction(Direction::Right);
        engine.toggle_pause().expect("pause");
        let before = engine.snapshot();
        engine.tick(Actor::Player).expect("tick");
        engine.tick(Actor::Ghosts).expect("tick");
        assert_eq!(engine.snapshot(), before);
    }
}
