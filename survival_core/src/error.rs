use crate::{EntityId, Position, map::GridError};

/// Errors raised by world setup and by level resolution.
///
/// None of these are recoverable mid-run: a level that returns one of them
/// leaves the history untouched and the driver is expected to stop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Board has no cells ({width}x{height})")]
    EmptyBoard { width: usize, height: usize },
    #[error("Board of {width}x{height} cells is too large to allocate")]
    BoardTooLarge { width: usize, height: usize },
    #[error("Cannot place {requested} entities on a board with {capacity} cells")]
    Overcrowded { requested: usize, capacity: usize },
    #[error("Agent {0} does not exist")]
    UnknownAgent(EntityId),
    #[error("Position {0} is outside the board")]
    OutOfBounds(Position),
    #[error("Position {0} is already occupied")]
    CellOccupied(Position),
    #[error("Agent {agent} at {position} has no valid direction to move in")]
    EmptyDirectionPool { agent: EntityId, position: Position },
    #[error("Scripted policy for agent {0} ran out of decisions")]
    ScriptExhausted(EntityId),
    #[error(transparent)]
    Grid(#[from] GridError),
}
