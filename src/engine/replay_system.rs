use std::path::Path;

use super::*;
use crate::event_log::EventLog;
use crate::types::ReplayDirection;

/// Parses the recording at `path` and resolves it against the map in its
/// header. Backward plans come back with the world already at the end.
fn load_recording(path: &Path, direction: ReplayDirection) -> GameResult<(World, ReplayPlan)> {
    let recorded = EventLog::load(path)?;
    let mut world = World::from_map(recorded.map.clone())?;
    let plan = ReplayPlan::build(&world, &recorded, direction)?;
    plan.seek_start(&mut world);
    world.drain_events();
    log::info!(
        "replaying {} ticks {direction:?} from {}",
        plan.len(),
        path.display()
    );
    Ok((world, plan))
}

fn replay_state(direction: ReplayDirection) -> GameState {
    match direction {
        ReplayDirection::Forward => GameState::Replay,
        ReplayDirection::Backward => GameState::ReplayReverse,
    }
}

impl GameEngine {
    /// Opens the configured recording for playback without starting a game,
    /// so the file on disk stays as it is.
    ///
    /// An empty recording still gets one replay tick, which reports the end.
    pub fn replaying(config: GameConfig, direction: ReplayDirection) -> GameResult<Self> {
        let (world, plan) = load_recording(&config.log_path, direction)?;
        Ok(Self {
            rng: session_rng(config.seed),
            config,
            world,
            state: replay_state(direction),
            log: None,
            replay: Some(ActiveReplay { plan, cursor: 0 }),
            bus: NotificationBus::new(),
            generation: 1,
            current_map: None,
            fault: None,
        })
    }

    /// Loads the recorded session and starts playing it back.
    ///
    /// The whole log is parsed and resolved against its map first; any
    /// error leaves the engine exactly as it was.
    pub fn start_replay(&mut self, direction: ReplayDirection) -> GameResult<()> {
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        let (world, plan) = load_recording(&self.config.log_path, direction)?;

        self.close_log()?;
        self.world = world;
        let finished = plan.is_empty();
        self.replay = Some(ActiveReplay { plan, cursor: 0 });
        self.announce_world();
        self.transition(replay_state(direction));
        if finished {
            self.finish_replay(direction);
        }
        Ok(())
    }

    pub(super) fn replay_step(&mut self) -> GameResult<()> {
        let Some(active) = self.replay.as_mut() else {
            return Ok(());
        };
        let direction = active.plan.direction();
        let Some(step) = active.plan.apply(active.cursor, &mut self.world) else {
            self.finish_replay(direction);
            return Ok(());
        };
        let touches_player = step.touches_player();
        active.cursor += 1;
        let done = active.cursor >= active.plan.len();
        self.publish_world_events();

        if direction == ReplayDirection::Forward && touches_player {
            if self.world.player().lives == 0 {
                return self.end_session(GameOverReason::Lost);
            }
            if self.world.can_complete() {
                return self.end_session(GameOverReason::Completed);
            }
        }
        if done {
            self.finish_replay(direction);
        }
        Ok(())
    }

    fn finish_replay(&mut self, direction: ReplayDirection) {
        log::info!("replay {direction:?} finished");
        self.replay = None;
        self.generation += 1;
        self.publish(GameEvent::ReplayFinished { direction });
    }
}
