use crate::constants::GHOST_EAT_BONUS;
use crate::maze::FieldId;
use crate::types::{Direction, EntityId, GameOverReason};
use crate::world::World;

/// What a single directional move did to the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveReport {
    pub moved: bool,
    /// The player left a field whose point it then cleared.
    pub cleared_point: bool,
    pub outcome: Option<GameOverReason>,
}

impl World {
    pub fn can_move(&self, entity: EntityId, dir: Direction) -> bool {
        self.move_target(entity, dir).is_some()
    }

    pub fn available_directions(&self, entity: EntityId) -> Vec<Direction> {
        Direction::MOVES
            .into_iter()
            .filter(|dir| self.can_move(entity, *dir))
            .collect()
    }

    fn move_target(&self, entity: EntityId, dir: Direction) -> Option<FieldId> {
        if matches!(entity, EntityId::Key(_)) {
            return None;
        }
        let from = self.position(entity)?;
        self.maze().passable_neighbor(from, dir)
    }

    /// Moves `entity` one field in `dir` and resolves the collision it causes.
    ///
    /// A blocked move changes nothing.
    pub(crate) fn move_entity(&mut self, entity: EntityId, dir: Direction) -> MoveReport {
        let Some(to) = self.move_target(entity, dir) else {
            return MoveReport::default();
        };
        let Some(from) = self.position(entity) else {
            return MoveReport::default();
        };
        self.relocate(entity, to);
        let cleared_point = entity == EntityId::Player && self.clear_point(from);
        let outcome = self.resolve_collisions();
        MoveReport {
            moved: true,
            cleared_point,
            outcome,
        }
    }

    /// Settles every ghost sharing the player's field, in ghost order.
    ///
    /// An eatable ghost goes home and pays out the bonus. A hunting ghost
    /// sends everyone home and costs a life; `Lost` once lives hit zero.
    pub(crate) fn resolve_collisions(&mut self) -> Option<GameOverReason> {
        let here = self.player().field;
        let touching: Vec<usize> = self
            .ghosts()
            .iter()
            .enumerate()
            .filter(|(_, ghost)| ghost.field == here)
            .map(|(idx, _)| idx)
            .collect();

        for idx in touching {
            let ghost = &self.ghosts()[idx];
            let (eatable, home) = (ghost.eatable, ghost.start);
            if eatable {
                let player = self.player();
                let (score, lives) = (player.score.saturating_add(GHOST_EAT_BONUS), player.lives);
                self.set_player_stats(score, lives);
                self.relocate(EntityId::Ghost(idx), home);
                continue;
            }

            self.send_everyone_home();
            let player = self.player();
            let (score, lives) = (player.score, player.lives.saturating_sub(1));
            self.set_player_stats(score, lives);
            return (lives == 0).then_some(GameOverReason::Lost);
        }
        None
    }

    fn send_everyone_home(&mut self) {
        let home = self.player().start;
        self.relocate(EntityId::Player, home);
        let homes: Vec<FieldId> = self.ghosts().iter().map(|ghost| ghost.start).collect();
        for (idx, home) in homes.into_iter().enumerate() {
            self.relocate(EntityId::Ghost(idx), home);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::MapSpec;
    use crate::types::Coord;

    fn world(text: &str) -> World {
        World::from_map(MapSpec::parse(text).expect("map parses")).expect("world builds")
    }

    fn field(world: &World, row: usize, col: usize) -> FieldId {
        world.maze().id_of(Coord::new(row, col)).expect("field in grid")
    }

    #[test]
    fn moves_succeed_only_into_open_neighbors() {
        let mut world = world("2 3\nS.X\nX.T\n");
        assert!(world.can_move(EntityId::Player, Direction::Right));
        assert!(!world.can_move(EntityId::Player, Direction::Down));
        assert!(!world.can_move(EntityId::Player, Direction::Up));
        assert!(!world.can_move(EntityId::Player, Direction::None));
        assert_eq!(world.available_directions(EntityId::Player), vec![Direction::Right]);

        let blocked = world.move_entity(EntityId::Player, Direction::Left);
        assert_eq!(blocked, MoveReport::default());
        assert!(world.drain_events().is_empty());

        let report = world.move_entity(EntityId::Player, Direction::Right);
        assert!(report.moved);
        assert!(report.cleared_point);
        assert_eq!(world.player().field, field(&world, 1, 2));
        assert!(!world.maze().field(field(&world, 1, 1)).point);
        assert!(world.occupancy_consistent());
    }

    #[test]
    fn ghosts_never_clear_points() {
        let mut world = world("1 3\nS.G\n");
        let report = world.move_entity(EntityId::Ghost(0), Direction::Left);
        assert!(report.moved);
        assert!(!report.cleared_point);
        assert!(world.maze().field(field(&world, 1, 3)).point);
    }

    #[test]
    fn hunting_ghost_costs_a_life_and_resets_positions() {
        let mut world = world("1 2\nSG\n");
        let report = world.move_entity(EntityId::Player, Direction::Right);
        assert_eq!(report.outcome, None);
        assert_eq!(world.player().lives, 2);
        assert_eq!(world.player().score, 0);
        assert_eq!(world.player().field, world.player().start);
        assert_eq!(world.ghosts()[0].field, world.ghosts()[0].start);
        assert!(world.occupancy_consistent());
    }

    #[test]
    fn last_life_lost_ends_the_game() {
        let mut world = World::with_stats(MapSpec::parse("1 2\nSG\n").expect("map"), 0, 1)
            .expect("world builds");
        let report = world.move_entity(EntityId::Ghost(0), Direction::Left);
        assert_eq!(report.outcome, Some(GameOverReason::Lost));
        assert_eq!(world.player().lives, 0);
    }

    #[test]
    fn eatable_ghost_is_eaten_for_bonus() {
        let mut world = world("1 3\nS.G\n");
        world.set_eatable(0, true);
        world.move_entity(EntityId::Ghost(0), Direction::Left);
        let report = world.move_entity(EntityId::Player, Direction::Right);
        assert_eq!(report.outcome, None);
        assert_eq!(world.player().score, GHOST_EAT_BONUS);
        assert_eq!(world.player().lives, 3);
        assert_eq!(world.player().field, field(&world, 1, 2));
        assert_eq!(world.ghosts()[0].field, field(&world, 1, 3));
        assert!(world.occupancy_consistent());
    }
}
