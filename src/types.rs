use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    /// The four directions a field links to, in neighbor-slot order.
    pub const MOVES: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub(crate) fn slot(self) -> Option<usize> {
        match self {
            Self::Up => Some(0),
            Self::Down => Some(1),
            Self::Left => Some(2),
            Self::Right => Some(3),
            Self::None => None,
        }
    }

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" | "w" => Some(Self::Up),
            "down" | "s" => Some(Self::Down),
            "left" | "a" => Some(Self::Left),
            "right" | "d" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Wall,
    Path,
    Goal,
}

impl FieldKind {
    /// Whether entities may stand on (and move into) a field of this kind.
    pub fn is_passable(self) -> bool {
        !matches!(self, Self::Wall)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parses the `row/col` form used by log records.
    pub fn parse(value: &str) -> Option<Self> {
        let (row, col) = value.split_once('/')?;
        Some(Self {
            row: row.parse().ok()?,
            col: col.parse().ok()?,
        })
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.row, self.col)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum EntityId {
    Player,
    Ghost(usize),
    Key(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Completed,
    Lost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayDirection {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Default,
    Paused,
    Replay,
    ReplayReverse,
    Ended(GameOverReason),
}

impl GameState {
    pub fn accepts_player_input(self) -> bool {
        matches!(self, Self::Default | Self::Paused)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub at: Coord,
    pub start: Coord,
    pub dir: Direction,
    pub lives: u32,
    pub score: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GhostView {
    pub index: usize,
    pub at: Coord,
    pub start: Coord,
    pub dir: Direction,
    pub eatable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyView {
    pub index: usize,
    pub at: Coord,
    pub collected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub at: Coord,
    pub kind: FieldKind,
    pub point: bool,
    pub occupants: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub state: GameState,
    pub rows: usize,
    pub cols: usize,
    pub fields: Vec<FieldView>,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub keys: Vec<KeyView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    WorldLoaded {
        rows: usize,
        cols: usize,
    },
    EntityMoved {
        entity: EntityId,
        from: Coord,
        to: Coord,
    },
    DirectionChanged {
        entity: EntityId,
        dir: Direction,
    },
    PointCleared {
        at: Coord,
    },
    PointRestored {
        at: Coord,
    },
    KeyCollected {
        key: usize,
    },
    KeyReleased {
        key: usize,
    },
    EatableChanged {
        ghost: usize,
        eatable: bool,
    },
    PlayerStats {
        score: u32,
        lives: u32,
    },
    StateChanged {
        state: GameState,
    },
    SessionEnded {
        reason: GameOverReason,
    },
    ReplayFinished {
        direction: ReplayDirection,
    },
    Fatal {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution() {
        for dir in Direction::MOVES {
            assert_ne!(dir.opposite(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::None.opposite(), Direction::None);
    }

    #[test]
    fn coord_uses_slash_separator() {
        let coord = Coord::new(3, 12);
        assert_eq!(coord.to_string(), "3/12");
        assert_eq!(Coord::parse("3/12"), Some(coord));
        assert_eq!(Coord::parse("3-12"), None);
        assert_eq!(Coord::parse("a/1"), None);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GameEvent::EatableChanged {
            ghost: 1,
            eatable: true,
        };
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["type"], "eatable_changed");
        assert_eq!(json["ghost"], 1);
    }
}
