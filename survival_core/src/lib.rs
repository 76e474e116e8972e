use std::fmt;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod game;
pub mod map;

pub use error::SimulationError;

/// Unique identifier for agents, assigned sequentially from 1.
pub type EntityId = usize;

/// Index of a food item in the environment's food list.
pub type FoodId = usize;

/// Represents a 2D board coordinate. Boards are 1-based: `x` lies in
/// `1..=width` and `y` in `1..=height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns the neighboring coordinate one step in `direction`.
    ///
    /// Returns `None` only if the step would underflow `usize`; the result is
    /// not checked against any board.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.offset();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four cardinal directions an agent can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed iteration order used when building candidate pools.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::South,
        Direction::West,
    ];

    /// Unit offset of the direction. North increases `y`.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_applies_unit_offsets() {
        let origin = Position::new(5, 5);
        assert_eq!(origin.step(Direction::North), Some(Position::new(5, 6)));
        assert_eq!(origin.step(Direction::South), Some(Position::new(5, 4)));
        assert_eq!(origin.step(Direction::East), Some(Position::new(6, 5)));
        assert_eq!(origin.step(Direction::West), Some(Position::new(4, 5)));
    }

    #[test]
    fn step_below_zero_is_none() {
        assert_eq!(Position::new(0, 3).step(Direction::West), None);
        assert_eq!(Position::new(1, 1).step(Direction::West), Some(Position::new(0, 1)));
    }
}
