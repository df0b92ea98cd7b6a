use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::GameConfig;
use crate::error::GameResult;
use crate::event_log::LogWriter;
use crate::loader::{load_map, LoadedMap};
use crate::notify::{NotificationBus, Observer, SubscriptionId};
use crate::replay::ReplayPlan;
use crate::types::{Direction, EntityId, GameEvent, GameOverReason, GameState, Snapshot};
use crate::world::World;

pub mod movement;
pub mod pursuit;
mod replay_system;
mod tick_system;

/// Periodic sources of work; each tick from one is applied atomically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "actor", content = "eatable", rename_all = "snake_case")]
pub enum Actor {
    Player,
    Ghosts,
    /// Flip every ghost to the given eatable flag.
    Eatable(bool),
    Replay,
}

/// Which actors should be running for the engine's current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActorPlan {
    Idle,
    Live {
        player: Duration,
        ghosts: Duration,
        uneatable: Duration,
        eatable: Duration,
        /// Ghosts are eatable right now, so the cycle starts mid-window.
        eatable_now: bool,
    },
    Replay {
        delays: Vec<Duration>,
    },
}

#[derive(Clone, Debug)]
struct ActiveReplay {
    plan: ReplayPlan,
    cursor: usize,
}

/// Synchronous game core: one world, its state machine and its log.
///
/// Every state transition bumps `generation`; whoever drives the engine
/// restarts its actors from [`GameEngine::actor_plan`] when it changes.
pub struct GameEngine {
    config: GameConfig,
    world: World,
    state: GameState,
    log: Option<LogWriter>,
    replay: Option<ActiveReplay>,
    rng: StdRng,
    bus: NotificationBus,
    generation: u64,
    current_map: Option<PathBuf>,
    fault: Option<String>,
}

impl GameEngine {
    /// Loads a map from the configured source and starts recording a game.
    pub fn new(config: GameConfig) -> GameResult<Self> {
        let mut rng = session_rng(config.seed);
        let loaded = load_map(&config.map_source, None, &mut rng)?;
        let world = World::from_map(loaded.map.clone())?;
        let log = LogWriter::create(&config.log_path, world.map())?;
        log::info!(
            "game started on a {}x{} grid, recording to {}",
            world.maze().rows(),
            world.maze().cols(),
            config.log_path.display()
        );

        let mut engine = Self {
            config,
            world,
            state: GameState::Default,
            log: Some(log),
            replay: None,
            rng,
            bus: NotificationBus::new(),
            generation: 1,
            current_map: loaded.origin,
            fault: None,
        };
        engine.announce_world();
        Ok(engine)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_recording(&self) -> bool {
        self.log.is_some()
    }

    /// Message of the fault that stopped this engine, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.world.snapshot(self.state)
    }

    pub fn subscribe(&mut self, observer: Box<dyn Observer>) -> SubscriptionId {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn actor_plan(&self) -> ActorPlan {
        if self.fault.is_some() {
            return ActorPlan::Idle;
        }
        match (self.state, &self.replay) {
            (GameState::Default, _) => ActorPlan::Live {
                player: self.config.player_tick_period(),
                ghosts: self.config.ghost_tick_period(),
                uneatable: self.config.uneatable_period(),
                eatable: self.config.eatable_period(),
                eatable_now: self.world.ghosts().iter().any(|ghost| ghost.eatable),
            },
            (GameState::Replay | GameState::ReplayReverse, Some(active)) => {
                let mut delays = active.plan.delays_from(active.cursor);
                if delays.is_empty() {
                    // nothing left to show; one tick reports the end
                    delays.push(Duration::ZERO);
                }
                ActorPlan::Replay { delays }
            }
            _ => ActorPlan::Idle,
        }
    }

    /// Replaces the world with a fresh one from the configured map source.
    ///
    /// A map that fails to load leaves the running session alone.
    pub fn new_game(&mut self) -> GameResult<()> {
        let loaded = load_map(
            &self.config.map_source,
            self.current_map.as_deref(),
            &mut self.rng,
        )?;
        self.start_session(loaded)
    }

    /// Nothing changes until the old log is flushed. Once the file is
    /// reopened there is no way back, so failing to reopen it stops the
    /// engine.
    fn start_session(&mut self, loaded: LoadedMap) -> GameResult<()> {
        let world = World::from_map(loaded.map)?;
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        match LogWriter::create(&self.config.log_path, world.map()) {
            Ok(log) => self.log = Some(log),
            Err(err) => {
                self.fail(&format!("cannot record the new game: {err}"));
                return Err(err);
            }
        }
        self.world = world;
        self.replay = None;
        self.current_map = loaded.origin;
        log::info!("new game on {:?}", self.current_map);
        self.announce_world();
        self.transition(GameState::Default);
        Ok(())
    }

    /// Returns whether the direction was accepted.
    pub fn set_player_direction(&mut self, dir: Direction) -> bool {
        if self.fault.is_some() || !self.state.accepts_player_input() {
            log::debug!("ignoring direction {dir:?} in state {:?}", self.state);
            return false;
        }
        self.world.set_direction(EntityId::Player, dir);
        self.publish_world_events();
        true
    }

    /// Switches between `Default` and `Paused`; other states are left as is.
    pub fn toggle_pause(&mut self) -> GameResult<GameState> {
        match self.state {
            GameState::Default => {
                if let Some(log) = self.log.as_mut() {
                    log.flush()?;
                }
                self.transition(GameState::Paused);
            }
            GameState::Paused => self.transition(GameState::Default),
            other => log::debug!("pause toggle ignored in state {other:?}"),
        }
        Ok(self.state)
    }

    /// Stops everything and closes the log; the engine stays readable.
    pub fn close(&mut self) -> GameResult<()> {
        self.replay = None;
        self.generation += 1;
        self.close_log()
    }

    /// Tears down after a fault the engine cannot recover from.
    pub fn fail(&mut self, message: &str) {
        log::error!("game stopped: {message}");
        self.fault = Some(message.to_string());
        self.replay = None;
        self.generation += 1;
        if let Err(err) = self.close_log() {
            log::error!("closing the log after a fault failed: {err}");
        }
        self.publish(GameEvent::Fatal {
            message: message.to_string(),
        });
    }

    fn end_session(&mut self, reason: GameOverReason) -> GameResult<()> {
        log::info!(
            "session ended: {reason:?} with score {} and {} lives",
            self.world.player().score,
            self.world.player().lives
        );
        self.replay = None;
        let closed = self.close_log();
        self.transition(GameState::Ended(reason));
        self.publish(GameEvent::SessionEnded { reason });
        closed
    }

    fn close_log(&mut self) -> GameResult<()> {
        match self.log.take() {
            Some(log) => log.close(),
            None => Ok(()),
        }
    }

    fn transition(&mut self, state: GameState) {
        self.state = state;
        self.generation += 1;
        self.publish(GameEvent::StateChanged { state });
    }

    fn announce_world(&mut self) {
        self.world.drain_events();
        self.publish(GameEvent::WorldLoaded {
            rows: self.world.maze().rows(),
            cols: self.world.maze().cols(),
        });
    }

    fn publish(&mut self, event: GameEvent) {
        self.publish_world_events();
        self.bus.publish(&event);
    }

    fn publish_world_events(&mut self) {
        let events = self.world.drain_events();
        self.bus.publish_all(&events);
    }
}

fn session_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use super::*;
    use crate::config::MapSource;

    pub fn engine_on(map: &str, dir: &Path) -> GameEngine {
        let config = GameConfig {
            seed: Some(7),
            log_path: dir.join("log.save"),
            ..GameConfig::default()
        }
        .with_map_source(MapSource::Inline(map.to_string()));
        GameEngine::new(config).expect("engine starts")
    }
}
