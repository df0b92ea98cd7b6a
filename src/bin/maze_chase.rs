use clap::{Parser, ValueEnum};
use maze_chase_core::config::{GameConfig, MapSource};
use maze_chase_core::constants::{
    EATABLE_DURATION_MS, GHOST_SPEED, LOG_FILE_NAME, PLAYER_SPEED, UNEATABLE_DURATION_MS,
};
use maze_chase_core::runtime::{GameHandle, GameRuntime};
use maze_chase_core::types::{Direction, GameEvent, ReplayDirection};
use maze_chase_core::GameResult;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Play,
    Replay,
    Reverse,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Play)]
    mode: Mode,
    /// Single map file to play.
    #[arg(long, conflicts_with = "maps")]
    map: Option<PathBuf>,
    /// Directory to pick random maps from.
    #[arg(long, default_value = "maps")]
    maps: PathBuf,
    #[arg(long, default_value = LOG_FILE_NAME)]
    log: PathBuf,
    #[arg(long, default_value_t = GHOST_SPEED)]
    ghost_speed: f64,
    #[arg(long, default_value_t = PLAYER_SPEED)]
    player_speed: f64,
    #[arg(
        long,
        default_value_t = UNEATABLE_DURATION_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    uneatable_ms: u64,
    #[arg(
        long,
        default_value_t = EATABLE_DURATION_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    eatable_ms: u64,
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn config(&self) -> GameConfig {
        let map_source = match &self.map {
            Some(path) => MapSource::File(path.clone()),
            None => MapSource::Directory(self.maps.clone()),
        };
        GameConfig {
            ghost_speed: self.ghost_speed,
            player_speed: self.player_speed,
            uneatable_ms: self.uneatable_ms,
            eatable_ms: self.eatable_ms,
            log_path: self.log.clone(),
            seed: self.seed,
            map_source,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    details: Value,
}

enum Input {
    Steer(Direction),
    Pause,
    Replay(ReplayDirection),
    NewGame,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if let Some(dir) = Direction::parse_move(line) {
        return Some(Input::Steer(dir));
    }
    match line {
        "p" | "pause" => Some(Input::Pause),
        "r" | "replay" => Some(Input::Replay(ReplayDirection::Forward)),
        "b" | "back" => Some(Input::Replay(ReplayDirection::Backward)),
        "n" | "new" => Some(Input::NewGame),
        "q" | "quit" => Some(Input::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = cli.config();
    emit_log("info", "config", json!(config));

    let started = match cli.mode {
        Mode::Play => GameRuntime::start(config),
        Mode::Replay => GameRuntime::replay(config, ReplayDirection::Forward),
        Mode::Reverse => GameRuntime::replay(config, ReplayDirection::Backward),
    };
    let runtime = match started {
        Ok(runtime) => runtime,
        Err(err) => {
            emit_log("error", "start_failed", json!({ "message": err.to_string() }));
            return ExitCode::FAILURE;
        }
    };
    let handle = runtime.handle();

    if let Err(err) = drive(&handle).await {
        emit_log("error", "command_failed", json!({ "message": err.to_string() }));
    }
    drop(handle);

    match runtime.join().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            emit_log("error", "fatal", json!({ "message": err.to_string() }));
            ExitCode::FAILURE
        }
    }
}

/// Prints every event and feeds stdin commands to the game until quit,
/// end of input, or a fatal error.
async fn drive(handle: &GameHandle) -> GameResult<()> {
    let (_, mut events) = handle.events().await?;
    let snapshot = handle.snapshot().await?;
    emit_log("info", "snapshot", json!(snapshot));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                let fatal = matches!(event, GameEvent::Fatal { .. });
                emit_event(&event);
                if fatal {
                    return Ok(());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return handle.close().await;
                };
                let Some(input) = parse_input(&line) else {
                    emit_log("warn", "unknown_command", json!({ "input": line }));
                    continue;
                };
                let result = match input {
                    Input::Steer(dir) => handle.set_direction(dir).await.map(|_| ()),
                    Input::Pause => handle.toggle_pause().await.map(|_| ()),
                    Input::Replay(direction) => handle.start_replay(direction).await,
                    Input::NewGame => handle.new_game().await,
                    Input::Quit => return handle.close().await,
                };
                if let Err(err) = result {
                    emit_log("warn", "command_rejected", json!({ "message": err.to_string() }));
                }
            }
        }
    }
}

fn emit_event(event: &GameEvent) {
    let level = match event {
        GameEvent::Fatal { .. } => "error",
        GameEvent::EntityMoved { .. } | GameEvent::DirectionChanged { .. } => "debug",
        _ => "info",
    };
    let details = serde_json::to_value(event).unwrap_or(Value::Null);
    let name = details
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("event")
        .to_string();
    emit_log(level, &name, details);
}

fn emit_log(level: &str, event: &str, details: Value) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(text) => println!("{text}"),
        Err(err) => log::error!("structured log line failed to serialize: {err}"),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
