use serde::{Deserialize, Serialize};

use crate::SimulationError;

/// Parameters fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    /// Number of agents (N).
    pub agents: usize,
    /// Number of food items (L).
    pub foods: usize,
    /// Seed for the shared random source. `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            width: 20,
            height: 20,
            agents: 4,
            foods: 8,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Checks that every agent and food item can get its own cell.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.width == 0 || self.height == 0 {
            return Err(SimulationError::EmptyBoard {
                width: self.width,
                height: self.height,
            });
        }
        let requested = self.agents.saturating_add(self.foods);
        match self.width.checked_mul(self.height) {
            Some(capacity) if requested > capacity => Err(SimulationError::Overcrowded {
                requested,
                capacity,
            }),
            Some(_) => Ok(()),
            None => Err(SimulationError::BoardTooLarge {
                width: self.width,
                height: self.height,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_world() {
        let config = SimulationConfig::default();
        assert_eq!((config.width, config.height), (20, 20));
        assert_eq!(config.agents, 4);
        assert_eq!(config.foods, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_board_is_allowed() {
        let config = SimulationConfig {
            width: 2,
            height: 2,
            agents: 2,
            foods: 2,
            seed: Some(1),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_more_entities_than_cells() {
        let config = SimulationConfig {
            width: 2,
            height: 2,
            agents: 3,
            foods: 2,
            seed: None,
        };
        assert_eq!(
            config.validate(),
            Err(SimulationError::Overcrowded {
                requested: 5,
                capacity: 4
            })
        );
    }

    #[test]
    fn rejects_overflowing_board() {
        let config = SimulationConfig {
            width: 1 << 40,
            height: 1 << 40,
            agents: 1,
            foods: 1,
            seed: Some(0),
        };
        assert_eq!(
            config.validate(),
            Err(SimulationError::BoardTooLarge {
                width: 1 << 40,
                height: 1 << 40
            })
        );
    }

    #[test]
    fn rejects_empty_board() {
        let config = SimulationConfig {
            width: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimulationError::EmptyBoard { .. })
        ));
    }
}
