use std::time::Duration;

use crate::error::{GameError, GameResult};
use crate::event_log::{EventLog, LogEntry, LogRecord};
use crate::maze::FieldId;
use crate::types::{EntityId, ReplayDirection};
use crate::world::{EntityState, World};

/// One record resolved against the world it was recorded on: the entity's
/// state before and after, plus the side effects the record implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub entity: EntityId,
    pub before: EntityState,
    pub after: EntityState,
    /// Point the player cleared by leaving `before`.
    pub eaten_point: Option<FieldId>,
    pub collected_keys: Vec<usize>,
}

impl Transition {
    fn redo(&self, world: &mut World) {
        world.apply_state(self.entity, self.after);
        if let Some(field) = self.eaten_point {
            world.clear_point(field);
        }
        for key in &self.collected_keys {
            world.collect_key(*key);
        }
    }

    fn undo(&self, world: &mut World) {
        world.apply_state(self.entity, self.before);
        if let Some(field) = self.eaten_point {
            world.restore_point(field);
        }
        for key in &self.collected_keys {
            world.release_key(*key);
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReplayStep {
    pub delay: Duration,
    pub transitions: Vec<Transition>,
}

impl ReplayStep {
    pub fn touches_player(&self) -> bool {
        self.transitions
            .iter()
            .any(|transition| transition.entity == EntityId::Player)
    }
}

/// A log turned into timed steps for one playback direction.
///
/// Forward steps redo each tick; backward steps undo ticks last to first.
#[derive(Clone, Debug)]
pub struct ReplayPlan {
    direction: ReplayDirection,
    steps: Vec<ReplayStep>,
}

impl ReplayPlan {
    /// Resolves every record against `world`, which must be the world the
    /// log header describes, before anything is shown.
    pub fn build(world: &World, log: &EventLog, direction: ReplayDirection) -> GameResult<Self> {
        let mut shadow = world.clone();
        let mut ticks = Vec::with_capacity(log.ticks.len());
        for tick in &log.ticks {
            let mut transitions = Vec::with_capacity(tick.entries.len());
            for entry in &tick.entries {
                let transition = resolve(&shadow, entry)?;
                transition.redo(&mut shadow);
                transitions.push(transition);
            }
            ticks.push(transitions);
        }

        let steps = match direction {
            ReplayDirection::Forward => ticks
                .into_iter()
                .zip(log.forward_delays())
                .map(|(transitions, delay)| ReplayStep { delay, transitions })
                .collect(),
            ReplayDirection::Backward => ticks
                .into_iter()
                .rev()
                .zip(log.backward_delays())
                .map(|(mut transitions, delay)| {
                    transitions.reverse();
                    ReplayStep { delay, transitions }
                })
                .collect(),
        };
        Ok(Self { direction, steps })
    }

    pub fn direction(&self) -> ReplayDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn delays_from(&self, index: usize) -> Vec<Duration> {
        self.steps.iter().skip(index).map(|step| step.delay).collect()
    }

    pub fn apply(&self, index: usize, world: &mut World) -> Option<&ReplayStep> {
        let step = self.steps.get(index)?;
        match self.direction {
            ReplayDirection::Forward => step.transitions.iter().for_each(|t| t.redo(world)),
            ReplayDirection::Backward => step.transitions.iter().for_each(|t| t.undo(world)),
        }
        Some(step)
    }

    /// Moves a freshly loaded world to where this plan begins: the recorded
    /// start for forward plans, the recorded end for backward ones.
    pub fn seek_start(&self, world: &mut World) {
        match self.direction {
            ReplayDirection::Forward => {}
            ReplayDirection::Backward => {
                for step in self.steps.iter().rev() {
                    step.transitions.iter().rev().for_each(|t| t.redo(world));
                }
            }
        }
    }
}

fn resolve(world: &World, entry: &LogEntry) -> GameResult<Transition> {
    let malformed = |reason: String| GameError::MalformedLogRecord {
        line: entry.line,
        reason,
    };
    let entity = entry.record.entity();
    let before = world
        .entity_state(entity)
        .ok_or_else(|| malformed(format!("no entity {entity:?} on this map")))?;
    let at = entry.record.at();
    let field = world
        .maze()
        .id_of(at)
        .filter(|id| world.maze().field(*id).kind.is_passable())
        .ok_or_else(|| malformed(format!("{at} is not a passable field")))?;

    let (after, eaten_point) = match entry.record {
        LogRecord::Player {
            score,
            lives,
            left_point,
            ..
        } => {
            let left = before.field();
            let eaten = (left_point && world.maze().field(left).point).then_some(left);
            (EntityState::Player { field, score, lives }, eaten)
        }
        LogRecord::Ghost { eatable, .. } => (EntityState::Ghost { field, eatable }, None),
    };

    let collected_keys = if entity == EntityId::Player && field != before.field() {
        world
            .keys()
            .iter()
            .enumerate()
            .filter(|(_, key)| key.field == field && !key.collected)
            .map(|(idx, _)| idx)
            .collect()
    } else {
        Vec::new()
    };

    Ok(Transition {
        entity,
        before,
        after,
        eaten_point,
        collected_keys,
    })
}
