use crate::constants::{STARTING_LIVES, STARTING_SCORE};
use crate::error::{GameError, GameResult};
use crate::maze::{FieldId, MapSpec, Maze, MazeLayout};
use crate::types::{
    Coord, Direction, EntityId, FieldKind, FieldView, GameEvent, GameState, GhostView, KeyView,
    PlayerView, Snapshot,
};

#[derive(Clone, Debug)]
pub struct Player {
    pub field: FieldId,
    pub start: FieldId,
    pub dir: Direction,
    pub lives: u32,
    pub score: u32,
}

#[derive(Clone, Debug)]
pub struct Ghost {
    pub field: FieldId,
    pub start: FieldId,
    pub dir: Direction,
    pub eatable: bool,
}

#[derive(Clone, Debug)]
pub struct Key {
    pub field: FieldId,
    pub collected: bool,
}

/// The part of an entity that ticks change and the event log records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityState {
    Player {
        field: FieldId,
        score: u32,
        lives: u32,
    },
    Ghost {
        field: FieldId,
        eatable: bool,
    },
}

impl EntityState {
    pub fn field(&self) -> FieldId {
        match self {
            Self::Player { field, .. } | Self::Ghost { field, .. } => *field,
        }
    }
}

/// Maze plus everything placed on it.
///
/// Each entity stores the field it stands on; `occupants` is an index
/// derived from those positions and is only touched by [`World::relocate`].
#[derive(Clone, Debug)]
pub struct World {
    map: MapSpec,
    maze: Maze,
    player: Player,
    ghosts: Vec<Ghost>,
    keys: Vec<Key>,
    occupants: Vec<Vec<EntityId>>,
    events: Vec<GameEvent>,
}

impl World {
    pub fn from_map(map: MapSpec) -> GameResult<Self> {
        Self::with_stats(map, STARTING_SCORE, STARTING_LIVES)
    }

    pub fn with_stats(map: MapSpec, score: u32, lives: u32) -> GameResult<Self> {
        let MazeLayout {
            maze,
            player_start,
            ghost_starts,
            key_fields,
        } = map.build()?;
        let field_id = |coord: Coord| {
            maze.id_of(coord)
                .ok_or_else(|| GameError::MapFormat(format!("placement {coord} outside grid")))
        };

        let start = field_id(player_start)?;
        let player = Player {
            field: start,
            start,
            dir: Direction::None,
            lives,
            score,
        };
        let ghosts = ghost_starts
            .into_iter()
            .map(|coord| {
                field_id(coord).map(|start| Ghost {
                    field: start,
                    start,
                    dir: Direction::None,
                    eatable: false,
                })
            })
            .collect::<GameResult<Vec<_>>>()?;
        let keys = key_fields
            .into_iter()
            .map(|coord| {
                field_id(coord).map(|field| Key {
                    field,
                    collected: false,
                })
            })
            .collect::<GameResult<Vec<_>>>()?;

        let mut occupants = vec![Vec::new(); maze.len()];
        occupants[player.field].push(EntityId::Player);
        for (idx, ghost) in ghosts.iter().enumerate() {
            occupants[ghost.field].push(EntityId::Ghost(idx));
        }
        for (idx, key) in keys.iter().enumerate() {
            occupants[key.field].push(EntityId::Key(idx));
        }

        Ok(Self {
            map,
            maze,
            player,
            ghosts,
            keys,
            occupants,
            events: Vec::new(),
        })
    }

    pub fn map(&self) -> &MapSpec {
        &self.map
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn ghosts(&self) -> &[Ghost] {
        &self.ghosts
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn coord(&self, field: FieldId) -> Coord {
        self.maze.field(field).coord
    }

    pub fn position(&self, entity: EntityId) -> Option<FieldId> {
        match entity {
            EntityId::Player => Some(self.player.field),
            EntityId::Ghost(idx) => self.ghosts.get(idx).map(|ghost| ghost.field),
            EntityId::Key(idx) => self.keys.get(idx).map(|key| key.field),
        }
    }

    pub fn direction(&self, entity: EntityId) -> Option<Direction> {
        match entity {
            EntityId::Player => Some(self.player.dir),
            EntityId::Ghost(idx) => self.ghosts.get(idx).map(|ghost| ghost.dir),
            EntityId::Key(_) => None,
        }
    }

    pub fn entities_at(&self, field: FieldId) -> &[EntityId] {
        self.occupants.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_keys_collected(&self) -> bool {
        self.keys.iter().all(|key| key.collected)
    }

    pub fn can_complete(&self) -> bool {
        self.all_keys_collected() && self.maze.field(self.player.field).kind == FieldKind::Goal
    }

    /// Every entity sits in exactly one occupant list, the one of its field.
    pub fn occupancy_consistent(&self) -> bool {
        let entities = std::iter::once(EntityId::Player)
            .chain((0..self.ghosts.len()).map(EntityId::Ghost))
            .chain((0..self.keys.len()).map(EntityId::Key));
        for entity in entities {
            let Some(field) = self.position(entity) else {
                return false;
            };
            let listed: Vec<FieldId> = self
                .occupants
                .iter()
                .enumerate()
                .filter(|(_, list)| list.contains(&entity))
                .map(|(id, _)| id)
                .collect();
            let copies = self.occupants[field]
                .iter()
                .filter(|occupant| **occupant == entity)
                .count();
            if listed != [field] || copies != 1 {
                return false;
            }
        }
        true
    }

    pub fn entity_state(&self, entity: EntityId) -> Option<EntityState> {
        match entity {
            EntityId::Player => Some(EntityState::Player {
                field: self.player.field,
                score: self.player.score,
                lives: self.player.lives,
            }),
            EntityId::Ghost(idx) => self.ghosts.get(idx).map(|ghost| EntityState::Ghost {
                field: ghost.field,
                eatable: ghost.eatable,
            }),
            EntityId::Key(_) => None,
        }
    }

    /// Player first, then ghosts in index order.
    pub fn mover_states(&self) -> Vec<(EntityId, EntityState)> {
        std::iter::once(EntityId::Player)
            .chain((0..self.ghosts.len()).map(EntityId::Ghost))
            .filter_map(|entity| self.entity_state(entity).map(|state| (entity, state)))
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self, state: GameState) -> Snapshot {
        Snapshot {
            state,
            rows: self.maze.rows(),
            cols: self.maze.cols(),
            fields: self
                .maze
                .fields()
                .enumerate()
                .map(|(id, field)| {
                    let mut occupants = self.occupants[id].clone();
                    occupants.sort();
                    FieldView {
                        at: field.coord,
                        kind: field.kind,
                        point: field.point,
                        occupants,
                    }
                })
                .collect(),
            player: PlayerView {
                at: self.coord(self.player.field),
                start: self.coord(self.player.start),
                dir: self.player.dir,
                lives: self.player.lives,
                score: self.player.score,
            },
            ghosts: self
                .ghosts
                .iter()
                .enumerate()
                .map(|(index, ghost)| GhostView {
                    index,
                    at: self.coord(ghost.field),
                    start: self.coord(ghost.start),
                    dir: ghost.dir,
                    eatable: ghost.eatable,
                })
                .collect(),
            keys: self
                .keys
                .iter()
                .enumerate()
                .map(|(index, key)| KeyView {
                    index,
                    at: self.coord(key.field),
                    collected: key.collected,
                })
                .collect(),
        }
    }

    /// Moves an entity's position and its occupancy entry together.
    pub(crate) fn relocate(&mut self, entity: EntityId, to: FieldId) -> bool {
        let Some(from) = self.position(entity) else {
            return false;
        };
        if from == to || to >= self.maze.len() {
            return false;
        }
        self.occupants[from].retain(|occupant| *occupant != entity);
        self.occupants[to].push(entity);
        match entity {
            EntityId::Player => self.player.field = to,
            EntityId::Ghost(idx) => self.ghosts[idx].field = to,
            EntityId::Key(idx) => self.keys[idx].field = to,
        }
        self.events.push(GameEvent::EntityMoved {
            entity,
            from: self.coord(from),
            to: self.coord(to),
        });
        true
    }

    pub(crate) fn set_direction(&mut self, entity: EntityId, dir: Direction) {
        let slot = match entity {
            EntityId::Player => &mut self.player.dir,
            EntityId::Ghost(idx) => match self.ghosts.get_mut(idx) {
                Some(ghost) => &mut ghost.dir,
                None => return,
            },
            EntityId::Key(_) => return,
        };
        if *slot != dir {
            *slot = dir;
            self.events.push(GameEvent::DirectionChanged { entity, dir });
        }
    }

    pub(crate) fn set_player_stats(&mut self, score: u32, lives: u32) {
        if self.player.score == score && self.player.lives == lives {
            return;
        }
        self.player.score = score;
        self.player.lives = lives;
        self.events.push(GameEvent::PlayerStats { score, lives });
    }

    pub(crate) fn set_eatable(&mut self, ghost: usize, eatable: bool) {
        let Some(entry) = self.ghosts.get_mut(ghost) else {
            return;
        };
        if entry.eatable != eatable {
            entry.eatable = eatable;
            self.events.push(GameEvent::EatableChanged { ghost, eatable });
        }
    }

    pub(crate) fn clear_point(&mut self, field: FieldId) -> bool {
        let changed = self.maze.set_point(field, false);
        if changed {
            self.events.push(GameEvent::PointCleared {
                at: self.coord(field),
            });
        }
        changed
    }

    pub(crate) fn restore_point(&mut self, field: FieldId) -> bool {
        let changed = self.maze.set_point(field, true);
        if changed {
            self.events.push(GameEvent::PointRestored {
                at: self.coord(field),
            });
        }
        changed
    }

    /// Collects every uncollected key lying on `field`.
    pub(crate) fn collect_keys_at(&mut self, field: FieldId) -> Vec<usize> {
        let waiting: Vec<usize> = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.field == field && !key.collected)
            .map(|(idx, _)| idx)
            .collect();
        for key in &waiting {
            self.collect_key(*key);
        }
        waiting
    }

    pub(crate) fn collect_key(&mut self, key: usize) {
        if let Some(entry) = self.keys.get_mut(key) {
            if !entry.collected {
                entry.collected = true;
                self.events.push(GameEvent::KeyCollected { key });
            }
        }
    }

    pub(crate) fn release_key(&mut self, key: usize) {
        if let Some(entry) = self.keys.get_mut(key) {
            if entry.collected {
                entry.collected = false;
                self.events.push(GameEvent::KeyReleased { key });
            }
        }
    }

    /// Restores a recorded entity state by direct placement.
    pub(crate) fn apply_state(&mut self, entity: EntityId, state: EntityState) {
        match (entity, state) {
            (EntityId::Player, EntityState::Player { field, score, lives }) => {
                self.relocate(entity, field);
                self.set_player_stats(score, lives);
            }
            (EntityId::Ghost(idx), EntityState::Ghost { field, eatable }) => {
                self.relocate(entity, field);
                self.set_eatable(idx, eatable);
            }
            _ => {}
        }
    }
}
