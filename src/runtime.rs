use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::GameConfig;
use crate::constants::COMMAND_QUEUE_DEPTH;
use crate::engine::{Actor, ActorPlan, GameEngine};
use crate::error::{GameError, GameResult};
use crate::notify::{ChannelObserver, Observer, SubscriptionId};
use crate::types::{Direction, GameEvent, GameState, ReplayDirection, Snapshot};

enum Command {
    Tick {
        generation: u64,
        actor: Actor,
    },
    SetDirection {
        dir: Direction,
        reply: oneshot::Sender<bool>,
    },
    NewGame {
        reply: oneshot::Sender<GameResult<()>>,
    },
    TogglePause {
        reply: oneshot::Sender<GameResult<GameState>>,
    },
    StartReplay {
        direction: ReplayDirection,
        reply: oneshot::Sender<GameResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Subscribe {
        observer: Box<dyn Observer>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    Close {
        reply: oneshot::Sender<GameResult<()>>,
    },
}

/// Cloneable entry point into a running game.
#[derive(Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<Command>,
}

impl GameHandle {
    /// Returns whether the game took the direction.
    pub async fn set_direction(&self, dir: Direction) -> GameResult<bool> {
        self.request(|reply| Command::SetDirection { dir, reply })
            .await
    }

    pub async fn new_game(&self) -> GameResult<()> {
        self.request(|reply| Command::NewGame { reply }).await?
    }

    pub async fn toggle_pause(&self) -> GameResult<GameState> {
        self.request(|reply| Command::TogglePause { reply }).await?
    }

    pub async fn start_replay(&self, direction: ReplayDirection) -> GameResult<()> {
        self.request(|reply| Command::StartReplay { direction, reply })
            .await?
    }

    pub async fn snapshot(&self) -> GameResult<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn subscribe(&self, observer: Box<dyn Observer>) -> GameResult<SubscriptionId> {
        self.request(|reply| Command::Subscribe { observer, reply })
            .await
    }

    /// Subscribes a channel that receives every event from now on.
    pub async fn events(&self) -> GameResult<(SubscriptionId, mpsc::UnboundedReceiver<GameEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(Box::new(ChannelObserver(tx))).await?;
        Ok((id, rx))
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> GameResult<bool> {
        self.request(|reply| Command::Unsubscribe { id, reply })
            .await
    }

    /// Stops the actors, closes the log and shuts the executor down.
    pub async fn close(&self) -> GameResult<()> {
        self.request(|reply| Command::Close { reply }).await?
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> GameResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| GameError::ExecutorClosed)?;
        response.await.map_err(|_| GameError::ExecutorClosed)
    }
}

/// A game running on the current tokio runtime.
pub struct GameRuntime {
    handle: GameHandle,
    task: JoinHandle<GameResult<()>>,
}

impl GameRuntime {
    /// Builds the engine and spawns its executor. Must be called from
    /// within a tokio runtime.
    pub fn start(config: GameConfig) -> GameResult<Self> {
        Ok(Self::spawn(GameEngine::new(config)?))
    }

    /// Plays back the recording at `config.log_path` without recording.
    pub fn replay(config: GameConfig, direction: ReplayDirection) -> GameResult<Self> {
        Ok(Self::spawn(GameEngine::replaying(config, direction)?))
    }

    fn spawn(engine: GameEngine) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let executor = Executor {
            engine,
            actor_tx: tx.downgrade(),
            actors: Vec::new(),
            running_generation: 0,
        };
        let task = tokio::spawn(executor.run(rx));
        Self {
            handle: GameHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> GameHandle {
        self.handle.clone()
    }

    /// Waits for the executor to stop; an error means the game died.
    pub async fn join(self) -> GameResult<()> {
        drop(self.handle);
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(GameError::Other(format!("game executor panicked: {err}"))),
        }
    }
}

/// Owns the engine; every world mutation happens inside `run`.
struct Executor {
    engine: GameEngine,
    actor_tx: mpsc::WeakSender<Command>,
    actors: Vec<JoinHandle<()>>,
    running_generation: u64,
}

impl Executor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) -> GameResult<()> {
        self.sync_actors();
        while let Some(command) = rx.recv().await {
            match command {
                Command::Tick { generation, actor } => {
                    if generation != self.engine.generation() {
                        log::trace!("dropping stale {actor:?} tick from generation {generation}");
                        continue;
                    }
                    if let Err(err) = self.engine.tick(actor) {
                        self.stop_actors();
                        self.engine.fail(&err.to_string());
                        return Err(err);
                    }
                }
                Command::SetDirection { dir, reply } => {
                    let _ = reply.send(self.engine.set_player_direction(dir));
                }
                Command::NewGame { reply } => {
                    let _ = reply.send(self.engine.new_game());
                }
                Command::TogglePause { reply } => {
                    let _ = reply.send(self.engine.toggle_pause());
                }
                Command::StartReplay { direction, reply } => {
                    let _ = reply.send(self.engine.start_replay(direction));
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.engine.snapshot());
                }
                Command::Subscribe { observer, reply } => {
                    let _ = reply.send(self.engine.subscribe(observer));
                }
                Command::Unsubscribe { id, reply } => {
                    let _ = reply.send(self.engine.unsubscribe(id));
                }
                Command::Close { reply } => {
                    self.stop_actors();
                    let _ = reply.send(self.engine.close());
                    log::info!("game closed");
                    return Ok(());
                }
            }
            if let Some(message) = self.engine.fault().map(|m| m.to_string()) {
                self.stop_actors();
                return Err(GameError::Other(message));
            }
            self.sync_actors();
        }

        self.stop_actors();
        log::info!("all game handles dropped, shutting down");
        self.engine.close()
    }

    /// Restarts the actors whenever the engine moved to a new generation.
    ///
    /// Actors only hold a weak sender, so dropping every handle still ends
    /// `run`.
    fn sync_actors(&mut self) {
        let generation = self.engine.generation();
        if generation == self.running_generation {
            return;
        }
        self.stop_actors();
        self.running_generation = generation;

        let tx = &self.actor_tx;
        match self.engine.actor_plan() {
            ActorPlan::Idle => {}
            ActorPlan::Live {
                player,
                ghosts,
                uneatable,
                eatable,
                eatable_now,
            } => {
                log::debug!("starting live actors for generation {generation}");
                self.actors = vec![
                    spawn_ticker(tx.clone(), generation, Actor::Player, player),
                    spawn_ticker(tx.clone(), generation, Actor::Ghosts, ghosts),
                    spawn_eatable_cycle(tx.clone(), generation, uneatable, eatable, eatable_now),
                ];
            }
            ActorPlan::Replay { delays } => {
                log::debug!("starting replay actor with {} steps", delays.len());
                self.actors = vec![spawn_replay(tx.clone(), generation, delays)];
            }
        }
    }

    fn stop_actors(&mut self) {
        for actor in self.actors.drain(..) {
            actor.abort();
        }
    }
}

/// Sends a tick unless the executor is gone; false means stop.
async fn send_tick(tx: &mpsc::WeakSender<Command>, generation: u64, actor: Actor) -> bool {
    let Some(tx) = tx.upgrade() else {
        return false;
    };
    tx.send(Command::Tick { generation, actor }).await.is_ok()
}

fn spawn_ticker(
    tx: mpsc::WeakSender<Command>,
    generation: u64,
    actor: Actor,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !send_tick(&tx, generation, actor).await {
                break;
            }
        }
    })
}

/// Uneatable window, then eatable window, forever.
fn spawn_eatable_cycle(
    tx: mpsc::WeakSender<Command>,
    generation: u64,
    uneatable: Duration,
    eatable: Duration,
    eatable_now: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut eatable_now = eatable_now;
        loop {
            let wait = if eatable_now { eatable } else { uneatable };
            time::sleep(wait).await;
            eatable_now = !eatable_now;
            if !send_tick(&tx, generation, Actor::Eatable(eatable_now)).await {
                break;
            }
        }
    })
}

fn spawn_replay(
    tx: mpsc::WeakSender<Command>,
    generation: u64,
    delays: Vec<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for delay in delays {
            time::sleep(delay).await;
            if !send_tick(&tx, generation, Actor::Replay).await {
                break;
            }
        }
    })
}
