use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::constants::{
    tick_period_ms, EATABLE_DURATION_MS, GHOST_SPEED, LOG_FILE_NAME, PLAYER_SPEED,
    UNEATABLE_DURATION_MS,
};

/// Where "new game" takes its map from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MapSource {
    File(PathBuf),
    /// A random map file from the directory, never the one just played.
    Directory(PathBuf),
    Inline(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct GameConfig {
    #[serde(rename = "ghostSpeed")]
    pub ghost_speed: f64,
    #[serde(rename = "playerSpeed")]
    pub player_speed: f64,
    #[serde(rename = "uneatableMs")]
    pub uneatable_ms: u64,
    #[serde(rename = "eatableMs")]
    pub eatable_ms: u64,
    #[serde(rename = "logPath")]
    pub log_path: PathBuf,
    pub seed: Option<u64>,
    #[serde(rename = "mapSource")]
    pub map_source: MapSource,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ghost_speed: GHOST_SPEED,
            player_speed: PLAYER_SPEED,
            uneatable_ms: UNEATABLE_DURATION_MS,
            eatable_ms: EATABLE_DURATION_MS,
            log_path: PathBuf::from(LOG_FILE_NAME),
            seed: None,
            map_source: MapSource::Directory(PathBuf::from("maps")),
        }
    }
}

impl GameConfig {
    pub fn with_map_source(mut self, map_source: MapSource) -> Self {
        self.map_source = map_source;
        self
    }

    pub fn ghost_tick_period(&self) -> Duration {
        Duration::from_millis(tick_period_ms(self.ghost_speed))
    }

    pub fn player_tick_period(&self) -> Duration {
        Duration::from_millis(tick_period_ms(self.player_speed))
    }

    /// Eatability windows are at least 1 ms long.
    pub fn uneatable_period(&self) -> Duration {
        Duration::from_millis(self.uneatable_ms.max(1))
    }

    pub fn eatable_period(&self) -> Duration {
        Duration::from_millis(self.eatable_ms.max(1))
    }
}
