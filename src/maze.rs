use crate::constants::LOG_DELIMITER;
use crate::error::{GameError, GameResult};
use crate::types::{Coord, Direction, FieldKind};

/// Stable index of a field inside [`Maze`].
pub type FieldId = usize;

#[derive(Clone, Debug)]
pub struct Field {
    pub coord: Coord,
    pub kind: FieldKind,
    pub point: bool,
    neighbors: [Option<FieldId>; 4],
}

impl Field {
    pub fn neighbor(&self, dir: Direction) -> Option<FieldId> {
        dir.slot().and_then(|slot| self.neighbors[slot])
    }
}

/// Rectangular field graph. Links are fixed at construction; only point
/// flags change afterwards.
#[derive(Clone, Debug)]
pub struct Maze {
    rows: usize,
    cols: usize,
    fields: Vec<Field>,
}

impl Maze {
    pub fn new(rows: usize, cols: usize, kinds: Vec<FieldKind>) -> GameResult<Self> {
        if kinds.len() != rows * cols {
            return Err(GameError::MapFormat(format!(
                "expected {} fields for a {rows}x{cols} grid, got {}",
                rows * cols,
                kinds.len()
            )));
        }
        let fields = kinds
            .into_iter()
            .enumerate()
            .map(|(id, kind)| {
                let coord = Coord::new(id / cols, id % cols);
                Field {
                    coord,
                    kind,
                    point: kind == FieldKind::Path,
                    neighbors: Direction::MOVES.map(|dir| step(coord, dir, rows, cols)),
                }
            })
            .collect();
        Ok(Self { rows, cols, fields })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn id_of(&self, coord: Coord) -> Option<FieldId> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return None;
        }
        Some(coord.row * self.cols + coord.col)
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id]
    }

    pub fn field_at(&self, coord: Coord) -> Option<&Field> {
        self.id_of(coord).map(|id| &self.fields[id])
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn neighbor(&self, id: FieldId, dir: Direction) -> Option<FieldId> {
        self.fields.get(id).and_then(|field| field.neighbor(dir))
    }

    /// Neighbor in `dir` when it exists and is not a wall.
    pub fn passable_neighbor(&self, id: FieldId, dir: Direction) -> Option<FieldId> {
        self.neighbor(id, dir)
            .filter(|next| self.fields[*next].kind.is_passable())
    }

    /// Sets the point flag of a path field, returning whether it changed.
    pub(crate) fn set_point(&mut self, id: FieldId, present: bool) -> bool {
        let field = &mut self.fields[id];
        if field.kind != FieldKind::Path || field.point == present {
            return false;
        }
        field.point = present;
        true
    }
}

fn step(coord: Coord, dir: Direction, rows: usize, cols: usize) -> Option<FieldId> {
    let (row, col) = match dir {
        Direction::Up => (coord.row.checked_sub(1)?, coord.col),
        Direction::Down => (coord.row + 1, coord.col),
        Direction::Left => (coord.row, coord.col.checked_sub(1)?),
        Direction::Right => (coord.row, coord.col + 1),
        Direction::None => return None,
    };
    if row >= rows || col >= cols {
        return None;
    }
    Some(row * cols + col)
}

/// A textual map as written in map files and log headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapSpec {
    pub rows: usize,
    pub cols: usize,
    pub lines: Vec<String>,
}

/// Maze plus the start placements read from a [`MapSpec`], in grid
/// coordinates (the map body surrounded by a wall border).
#[derive(Clone, Debug)]
pub struct MazeLayout {
    pub maze: Maze,
    pub player_start: Coord,
    pub ghost_starts: Vec<Coord>,
    pub key_fields: Vec<Coord>,
}

impl MapSpec {
    /// Reads a map until a blank line, the log delimiter or the end of text.
    pub fn parse(text: &str) -> GameResult<Self> {
        let lines: Vec<&str> = text
            .lines()
            .take_while(|line| !line.trim().is_empty() && line.trim_end() != LOG_DELIMITER)
            .collect();
        Self::parse_lines(&lines)
    }

    pub fn parse_lines(lines: &[&str]) -> GameResult<Self> {
        let Some((header, body)) = lines.split_first() else {
            return Err(GameError::MapFormat("missing `rows cols` header".to_string()));
        };
        let mut dims = header.split_whitespace().map(str::parse::<usize>);
        let (rows, cols) = match (dims.next(), dims.next()) {
            (Some(Ok(rows)), Some(Ok(cols))) if rows > 0 && cols > 0 => (rows, cols),
            _ => {
                return Err(GameError::MapFormat(format!(
                    "invalid dimensions line `{header}`"
                )))
            }
        };
        let body: Vec<String> = body
            .iter()
            .map(|line| line.trim_end().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if body.len() != rows {
            return Err(GameError::MapFormat(format!(
                "expected {rows} map rows, found {}",
                body.len()
            )));
        }
        if let Some((idx, line)) = body
            .iter()
            .enumerate()
            .find(|(_, line)| line.chars().count() != cols)
        {
            return Err(GameError::MapFormat(format!(
                "row {} has {} columns, expected {cols}",
                idx + 1,
                line.chars().count()
            )));
        }
        Ok(Self {
            rows,
            cols,
            lines: body,
        })
    }

    /// Header text written ahead of a log: dimensions followed by the body.
    pub fn header_lines(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 1);
        out.push(format!("{} {}", self.rows, self.cols));
        out.extend(self.lines.iter().cloned());
        out
    }

    pub fn build(&self) -> GameResult<MazeLayout> {
        let grid_rows = self.rows + 2;
        let grid_cols = self.cols + 2;
        let mut kinds = vec![FieldKind::Wall; grid_rows * grid_cols];
        let mut player_start = None;
        let mut ghost_starts = Vec::new();
        let mut key_fields = Vec::new();

        for (row, line) in self.lines.iter().enumerate() {
            for (col, cell) in line.chars().enumerate() {
                let coord = Coord::new(row + 1, col + 1);
                let kind = match cell {
                    'X' => FieldKind::Wall,
                    '.' => FieldKind::Path,
                    'T' => FieldKind::Goal,
                    'K' => {
                        key_fields.push(coord);
                        FieldKind::Path
                    }
                    'G' => {
                        ghost_starts.push(coord);
                        FieldKind::Path
                    }
                    'S' => {
                        if player_start.replace(coord).is_some() {
                            return Err(GameError::MapFormat(
                                "more than one player start `S`".to_string(),
                            ));
                        }
                        FieldKind::Path
                    }
                    other => {
                        return Err(GameError::MapFormat(format!(
                            "unknown map character `{other}` at {coord}"
                        )))
                    }
                };
                kinds[coord.row * grid_cols + coord.col] = kind;
            }
        }

        let player_start = player_start
            .ok_or_else(|| GameError::MapFormat("missing player start `S`".to_string()))?;
        Ok(MazeLayout {
            maze: Maze::new(grid_rows, grid_cols, kinds)?,
            player_start,
            ghost_starts,
            key_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SAMPLE: &str = "3 4\n.S.T\n.XX.\nG..K\n";

    #[test]
    fn parse_builds_bordered_grid() {
        let parsed = MapSpec::parse(SAMPLE).expect("map should parse");
        let layout = parsed.build().expect("map should build");
        assert_eq!(layout.maze.rows(), 5);
        assert_eq!(layout.maze.cols(), 6);
        assert_eq!(layout.player_start, Coord::new(1, 2));
        assert_eq!(layout.ghost_starts, vec![Coord::new(3, 1)]);
        assert_eq!(layout.key_fields, vec![Coord::new(3, 4)]);
        for col in 0..6 {
            for row in [0, 4] {
                let kind = layout.maze.field_at(Coord::new(row, col)).map(|f| f.kind);
                assert_eq!(kind, Some(FieldKind::Wall));
            }
        }
        let goal = layout.maze.field_at(Coord::new(1, 4)).expect("goal in grid");
        assert_eq!(goal.kind, FieldKind::Goal);
        assert!(!goal.point);
        let start = layout.maze.field_at(Coord::new(1, 2)).expect("start in grid");
        assert!(start.point);
    }

    #[test]
    fn parse_stops_at_blank_line_and_delimiter() {
        let parsed = MapSpec::parse("1 2\nS.\n\ngarbage").expect("blank line ends map");
        assert_eq!(parsed.lines, vec!["S.".to_string()]);
        let parsed = MapSpec::parse("1 2\nS.\n--- LOG\n# 2024").expect("delimiter ends map");
        assert_eq!(parsed.header_lines(), vec!["1 2".to_string(), "S.".to_string()]);
    }

    #[test]
    fn malformed_maps_are_rejected() {
        assert!(matches!(MapSpec::parse(""), Err(GameError::MapFormat(_))));
        assert!(matches!(MapSpec::parse("x y\n"), Err(GameError::MapFormat(_))));
        assert!(matches!(MapSpec::parse("2 2\nS.\n"), Err(GameError::MapFormat(_))));
        assert!(matches!(MapSpec::parse("1 3\nS.\n"), Err(GameError::MapFormat(_))));
        let unknown = MapSpec::parse("1 2\nS?\n").expect("shape is fine");
        assert!(matches!(unknown.build(), Err(GameError::MapFormat(_))));
        let no_start = MapSpec::parse("1 2\n..\n").expect("shape is fine");
        assert!(matches!(no_start.build(), Err(GameError::MapFormat(_))));
        let two_starts = MapSpec::parse("1 2\nSS\n").expect("shape is fine");
        assert!(matches!(two_starts.build(), Err(GameError::MapFormat(_))));
    }

    #[test]
    fn corner_fields_have_no_outward_links() {
        let maze = Maze::new(2, 2, vec![FieldKind::Path; 4]).expect("grid");
        assert_eq!(maze.neighbor(0, Direction::Up), None);
        assert_eq!(maze.neighbor(0, Direction::Left), None);
        assert_eq!(maze.neighbor(0, Direction::Right), Some(1));
        assert_eq!(maze.neighbor(0, Direction::Down), Some(2));
        assert_eq!(maze.neighbor(3, Direction::None), None);
    }

    #[test]
    fn passable_neighbor_skips_walls() {
        let maze = Maze::new(1, 3, vec![FieldKind::Path, FieldKind::Wall, FieldKind::Goal])
            .expect("grid");
        assert_eq!(maze.passable_neighbor(0, Direction::Right), None);
        assert_eq!(maze.passable_neighbor(1, Direction::Right), Some(2));
    }

    proptest! {
        #[test]
        fn neighbor_links_are_symmetric(rows in 1usize..12, cols in 1usize..12) {
            let maze = Maze::new(rows, cols, vec![FieldKind::Path; rows * cols]).expect("grid");
            for id in 0..maze.len() {
                for dir in Direction::MOVES {
                    if let Some(next) = maze.neighbor(id, dir) {
                        prop_assert_eq!(maze.neighbor(next, dir.opposite()), Some(id));
                    }
                }
            }
        }
    }
}
