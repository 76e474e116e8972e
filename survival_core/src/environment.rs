use std::fmt;

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    Direction, EntityId, FoodId, Position, SimulationError, config::SimulationConfig, map::Grid,
};

/// Reward for biting into a food item.
pub const EAT_REWARD: i64 = 1;
/// Reward for landing an attack on another agent.
pub const ATTACK_REWARD: i64 = 2;
/// Penalty taken by the agent on the receiving end of an attack.
pub const DEFEAT_PENALTY: i64 = 4;
/// Penalty for attacking a cell with no agent in it.
pub const WASTED_ATTACK_PENALTY: i64 = 1;

/// A passive food item. Its position never changes during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub position: Position,
}

impl fmt::Display for Food {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Food at {}", self.position)
    }
}

/// Holds the state of an agent within the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: EntityId,
    pub position: Position,
    pub reward: i64,
}

impl AgentState {
    fn eat_food(&mut self) {
        self.reward += EAT_REWARD;
    }

    fn attack(&mut self, vacant: bool) {
        if vacant {
            self.reward -= WASTED_ATTACK_PENALTY;
        } else {
            self.reward += ATTACK_REWARD;
        }
    }

    fn defeated(&mut self) {
        self.reward -= DEFEAT_PENALTY;
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Agent No. {} at {}\nCurrent reward: {}",
            self.id, self.position, self.reward
        )
    }
}

/// What the occupancy index records for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupant {
    Agent(EntityId),
    Food(FoodId),
}

/// Result of looking up a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity<'a> {
    Agent(&'a AgentState),
    Food(&'a Food),
    Nothing,
}

/// An agent's choice for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub attack: bool,
    pub direction: Direction,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attack {
            write!(f, "attack {}", self.direction)
        } else {
            write!(f, "move {}", self.direction)
        }
    }
}

/// Represents the outcome of resolving an agent's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResult {
    /// The target cell was empty and the agent moved into it.
    Moved { to: Position, wasted_attack: bool },
    /// The target cell held another agent and no attack was made.
    Bumped { other: EntityId },
    /// The agent attacked the agent in the target cell.
    Hit { defender: EntityId },
    /// The target cell held food; the agent ate without moving.
    Ate { food: FoodId, wasted_attack: bool },
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionResult::Moved {
                to,
                wasted_attack: false,
            } => write!(f, "moved to {to}"),
            ActionResult::Moved {
                to,
                wasted_attack: true,
            } => write!(f, "swung at nothing, moved to {to}"),
            ActionResult::Bumped { other } => write!(f, "bumped into agent {other}"),
            ActionResult::Hit { defender } => write!(f, "hit agent {defender}"),
            ActionResult::Ate {
                food,
                wasted_attack: false,
            } => write!(f, "ate food {food}"),
            ActionResult::Ate {
                food,
                wasted_attack: true,
            } => write!(f, "attacked and ate food {food}"),
        }
    }
}

/// Provides a read-only view of the environment relevant to one agent.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentView<'a> {
    pub agent_state: &'a AgentState,
    environment: &'a Environment,
}

impl<'a> EnvironmentView<'a> {
    /// Position of the agent this view was built for.
    pub fn location(&self) -> Position {
        self.agent_state.position
    }

    pub fn contains(&self, position: Position) -> bool {
        self.environment.contains(position)
    }

    pub fn entity_at(&self, position: Position) -> Entity<'a> {
        self.environment.entity_at(position)
    }
}

/// Manages the simulation world: the board occupancy, the agents and the food.
#[derive(Debug, Clone)]
pub struct Environment {
    occupancy: Grid<Option<Occupant>>,
    agents: Vec<AgentState>,
    foods: Vec<Food>,
}

impl Environment {
    /// Creates a new, empty environment.
    pub fn new(width: usize, height: usize) -> Self {
        Environment {
            occupancy: Grid::new(width, height),
            agents: Vec::new(),
            foods: Vec::new(),
        }
    }

    /// Builds a board from `config` and scatters agents then food on
    /// distinct random cells.
    pub fn populate<R: Rng + ?Sized>(
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut environment = Environment::new(config.width, config.height);
        environment.place_initial(config.agents, config.foods, rng)?;
        info!(
            "Populated {}x{} board with {} agents and {} foods",
            config.width, config.height, config.agents, config.foods
        );
        Ok(environment)
    }

    /// Places `agents` agents and then `foods` food items on uniformly random
    /// free cells, redrawing on collision.
    pub fn place_initial<R: Rng + ?Sized>(
        &mut self,
        agents: usize,
        foods: usize,
        rng: &mut R,
    ) -> Result<(), SimulationError> {
        let requested = (self.agents.len() + self.foods.len())
            .saturating_add(agents)
            .saturating_add(foods);
        let capacity = self.occupancy.cell_count();
        if requested > capacity {
            return Err(SimulationError::Overcrowded {
                requested,
                capacity,
            });
        }
        for _ in 0..agents {
            let position = self.random_free_position(rng);
            self.add_agent(position)?;
        }
        for _ in 0..foods {
            let position = self.random_free_position(rng);
            self.add_food(position)?;
        }
        Ok(())
    }

    /// Rejection-samples a cell until an empty one comes up. Callers must
    /// ensure at least one free cell exists.
    fn random_free_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        loop {
            let position = Position {
                x: rng.random_range(1..=self.width()),
                y: rng.random_range(1..=self.height()),
            };
            if self.occupancy[position].is_none() {
                return position;
            }
        }
    }

    /// Adds an agent at `position` and returns its id. Ids are assigned
    /// sequentially starting at 1.
    pub fn add_agent(&mut self, position: Position) -> Result<EntityId, SimulationError> {
        self.ensure_free(position)?;
        let id = self.agents.len() + 1;
        self.occupancy.set(position, Some(Occupant::Agent(id)))?;
        self.agents.push(AgentState {
            id,
            position,
            reward: 0,
        });
        Ok(id)
    }

    /// Adds a food item at `position`.
    pub fn add_food(&mut self, position: Position) -> Result<FoodId, SimulationError> {
        self.ensure_free(position)?;
        let id = self.foods.len();
        self.occupancy.set(position, Some(Occupant::Food(id)))?;
        self.foods.push(Food { id, position });
        Ok(id)
    }

    fn ensure_free(&self, position: Position) -> Result<(), SimulationError> {
        match self.occupancy.get(position) {
            None => Err(SimulationError::OutOfBounds(position)),
            Some(Some(_)) => Err(SimulationError::CellOccupied(position)),
            Some(None) => Ok(()),
        }
    }

    pub fn width(&self) -> usize {
        self.occupancy.width()
    }

    pub fn height(&self) -> usize {
        self.occupancy.height()
    }

    pub fn contains(&self, position: Position) -> bool {
        self.occupancy.contains(position)
    }

    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    pub fn foods(&self) -> &[Food] {
        &self.foods
    }

    pub fn occupancy(&self) -> &Grid<Option<Occupant>> {
        &self.occupancy
    }

    pub fn get_agent_state(&self, agent_id: EntityId) -> Option<&AgentState> {
        agent_id
            .checked_sub(1)
            .and_then(|index| self.agents.get(index))
    }

    fn agent_index(&self, agent_id: EntityId) -> Result<usize, SimulationError> {
        match self.get_agent_state(agent_id) {
            Some(_) => Ok(agent_id - 1),
            None => Err(SimulationError::UnknownAgent(agent_id)),
        }
    }

    /// Finds the entity at the specified position. Off-board positions hold
    /// nothing.
    pub fn entity_at(&self, position: Position) -> Entity<'_> {
        match self.occupancy.get(position).copied().flatten() {
            Some(Occupant::Agent(id)) => match self.get_agent_state(id) {
                Some(agent) => Entity::Agent(agent),
                None => Entity::Nothing,
            },
            Some(Occupant::Food(id)) => match self.foods.get(id) {
                Some(food) => Entity::Food(food),
                None => Entity::Nothing,
            },
            None => Entity::Nothing,
        }
    }

    /// Builds the read-only view handed to an agent's policy.
    pub fn view(&self, agent_id: EntityId) -> Result<EnvironmentView<'_>, SimulationError> {
        let agent_state = self
            .get_agent_state(agent_id)
            .ok_or(SimulationError::UnknownAgent(agent_id))?;
        Ok(EnvironmentView {
            agent_state,
            environment: self,
        })
    }

    /// Moves an agent to an empty cell, keeping the occupancy index in step.
    /// This is the only way an agent's position changes.
    pub fn relocate(
        &mut self,
        agent_id: EntityId,
        new_position: Position,
    ) -> Result<(), SimulationError> {
        let index = self.agent_index(agent_id)?;
        self.ensure_free(new_position)?;
        let old_position = self.agents[index].position;
        self.occupancy.set(old_position, None)?;
        self.occupancy
            .set(new_position, Some(Occupant::Agent(agent_id)))?;
        self.agents[index].position = new_position;
        Ok(())
    }

    /// Resolves a single decision for a given agent.
    ///
    /// | target     | no attack       | attack                          |
    /// |------------|-----------------|---------------------------------|
    /// | empty      | move            | -1, move                        |
    /// | agent      | nothing         | defender -4, attacker +2        |
    /// | food       | +1, stay        | +1 and -1, stay                 |
    pub fn process_action(
        &mut self,
        agent_id: EntityId,
        decision: Decision,
    ) -> Result<ActionResult, SimulationError> {
        let index = self.agent_index(agent_id)?;
        let current_pos = self.agents[index].position;
        let target_pos = current_pos
            .step(decision.direction)
            .ok_or(SimulationError::OutOfBounds(current_pos))?;
        let target = self
            .occupancy
            .get(target_pos)
            .copied()
            .ok_or(SimulationError::OutOfBounds(target_pos))?;

        let result = match target {
            None => {
                if decision.attack {
                    self.agents[index].attack(true);
                }
                self.relocate(agent_id, target_pos)?;
                ActionResult::Moved {
                    to: target_pos,
                    wasted_attack: decision.attack,
                }
            }
            Some(Occupant::Agent(other)) => {
                if decision.attack {
                    let defender = self.agent_index(other)?;
                    self.agents[defender].defeated();
                    self.agents[index].attack(false);
                    ActionResult::Hit { defender: other }
                } else {
                    ActionResult::Bumped { other }
                }
            }
            Some(Occupant::Food(food)) => {
                // Food stays on the board; the same item can be eaten again.
                self.agents[index].eat_food();
                if decision.attack {
                    self.agents[index].attack(true);
                }
                ActionResult::Ate {
                    food,
                    wasted_attack: decision.attack,
                }
            }
        };
        debug!(
            "Agent {} ({}) at {}: {} -> reward {}",
            agent_id, decision, current_pos, result, self.agents[index].reward
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn decision(attack: bool, direction: Direction) -> Decision {
        Decision { attack, direction }
    }

    #[test]
    fn entity_at_reports_each_kind() {
        let mut env = Environment::new(3, 3);
        let agent = env.add_agent(Position::new(1, 1)).unwrap();
        let food = env.add_food(Position::new(2, 2)).unwrap();

        assert!(matches!(env.entity_at(Position::new(1, 1)), Entity::Agent(a) if a.id == agent));
        assert!(matches!(env.entity_at(Position::new(2, 2)), Entity::Food(f) if f.id == food));
        assert_eq!(env.entity_at(Position::new(3, 3)), Entity::Nothing);
        assert_eq!(env.entity_at(Position::new(0, 3)), Entity::Nothing);
    }

    #[test]
    fn agent_ids_start_at_one() {
        let mut env = Environment::new(4, 4);
        assert_eq!(env.add_agent(Position::new(1, 1)), Ok(1));
        assert_eq!(env.add_agent(Position::new(2, 1)), Ok(2));
        assert_eq!(env.get_agent_state(0), None);
    }

    #[test]
    fn cannot_stack_entities() {
        let mut env = Environment::new(2, 2);
        env.add_food(Position::new(1, 1)).unwrap();
        assert_eq!(
            env.add_agent(Position::new(1, 1)),
            Err(SimulationError::CellOccupied(Position::new(1, 1)))
        );
        assert_eq!(
            env.add_agent(Position::new(3, 1)),
            Err(SimulationError::OutOfBounds(Position::new(3, 1)))
        );
    }

    #[test]
    fn place_initial_fills_board_exactly() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut env = Environment::new(3, 3);
        env.place_initial(4, 5, &mut rng).unwrap();
        assert_eq!(env.agents().len(), 4);
        assert_eq!(env.foods().len(), 5);
        assert!(env.occupancy().enumerate().all(|(_, cell)| cell.is_some()));
    }

    #[test]
    fn place_initial_rejects_overcrowding() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut env = Environment::new(2, 2);
        assert_eq!(
            env.place_initial(3, 2, &mut rng),
            Err(SimulationError::Overcrowded {
                requested: 5,
                capacity: 4
            })
        );
        assert!(env.agents().is_empty());
    }

    #[test]
    fn place_initial_saturates_huge_requests() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut env = Environment::new(2, 2);
        env.add_agent(Position::new(1, 1)).unwrap();
        assert_eq!(
            env.place_initial(usize::MAX, 1, &mut rng),
            Err(SimulationError::Overcrowded {
                requested: usize::MAX,
                capacity: 4
            })
        );
        assert_eq!(env.agents().len(), 1);
    }

    #[test]
    fn relocate_updates_occupancy() {
        let mut env = Environment::new(3, 3);
        let id = env.add_agent(Position::new(1, 1)).unwrap();
        env.relocate(id, Position::new(1, 2)).unwrap();
        assert_eq!(env.entity_at(Position::new(1, 1)), Entity::Nothing);
        assert_eq!(env.occupancy()[Position::new(1, 2)], Some(Occupant::Agent(id)));
        assert_eq!(env.agents()[0].position, Position::new(1, 2));
    }

    #[test]
    fn relocate_refuses_occupied_cell() {
        let mut env = Environment::new(3, 3);
        let id = env.add_agent(Position::new(1, 1)).unwrap();
        env.add_food(Position::new(2, 1)).unwrap();
        assert_eq!(
            env.relocate(id, Position::new(2, 1)),
            Err(SimulationError::CellOccupied(Position::new(2, 1)))
        );
        assert_eq!(env.agents()[0].position, Position::new(1, 1));
    }

    #[test]
    fn moving_into_empty_cell() {
        let mut env = Environment::new(3, 3);
        let id = env.add_agent(Position::new(2, 2)).unwrap();
        let result = env.process_action(id, decision(false, Direction::North));
        assert_eq!(
            result,
            Ok(ActionResult::Moved {
                to: Position::new(2, 3),
                wasted_attack: false
            })
        );
        assert_eq!(env.agents()[0].reward, 0);
    }

    #[test]
    fn attacking_empty_cell_costs_one_and_moves() {
        let mut env = Environment::new(3, 3);
        let id = env.add_agent(Position::new(2, 2)).unwrap();
        env.process_action(id, decision(true, Direction::West)).unwrap();
        let agent = &env.agents()[0];
        assert_eq!(agent.reward, -1);
        assert_eq!(agent.position, Position::new(1, 2));
    }

    #[test]
    fn bumping_changes_nothing() {
        let mut env = Environment::new(3, 3);
        let a = env.add_agent(Position::new(1, 1)).unwrap();
        let b = env.add_agent(Position::new(2, 1)).unwrap();
        let result = env.process_action(a, decision(false, Direction::East));
        assert_eq!(result, Ok(ActionResult::Bumped { other: b }));
        assert_eq!(env.agents()[0].position, Position::new(1, 1));
        assert_eq!(env.agents()[1].position, Position::new(2, 1));
        assert!(env.agents().iter().all(|agent| agent.reward == 0));
    }

    #[test]
    fn attack_on_agent_pays_two_and_costs_four() {
        let mut env = Environment::new(3, 3);
        let a = env.add_agent(Position::new(1, 1)).unwrap();
        let b = env.add_agent(Position::new(1, 2)).unwrap();
        let result = env.process_action(a, decision(true, Direction::North));
        assert_eq!(result, Ok(ActionResult::Hit { defender: b }));
        assert_eq!(env.agents()[0].reward, 2);
        assert_eq!(env.agents()[1].reward, -4);
        assert_eq!(env.agents()[0].position, Position::new(1, 1));
        assert_eq!(env.agents()[1].position, Position::new(1, 2));
    }

    #[test]
    fn eating_leaves_agent_and_food_in_place() {
        let mut env = Environment::new(2, 2);
        let id = env.add_agent(Position::new(1, 1)).unwrap();
        env.add_food(Position::new(2, 1)).unwrap();
        for _ in 0..3 {
            env.process_action(id, decision(false, Direction::East))
                .unwrap();
        }
        assert_eq!(env.agents()[0].reward, 3);
        assert_eq!(env.agents()[0].position, Position::new(1, 1));
        assert_eq!(env.foods()[0].position, Position::new(2, 1));
    }

    #[test]
    fn attacking_food_eats_and_pays_penalty() {
        let mut env = Environment::new(2, 2);
        let id = env.add_agent(Position::new(1, 1)).unwrap();
        let food = env.add_food(Position::new(1, 2)).unwrap();
        let result = env.process_action(id, decision(true, Direction::North));
        assert_eq!(
            result,
            Ok(ActionResult::Ate {
                food,
                wasted_attack: true
            })
        );
        assert_eq!(env.agents()[0].reward, 0);
        assert_eq!(env.agents()[0].position, Position::new(1, 1));
    }

    #[test]
    fn off_board_target_is_an_error() {
        let mut env = Environment::new(2, 2);
        let id = env.add_agent(Position::new(1, 1)).unwrap();
        assert_eq!(
            env.process_action(id, decision(false, Direction::South)),
            Err(SimulationError::OutOfBounds(Position::new(1, 0)))
        );
        assert_eq!(
            env.process_action(7, decision(false, Direction::North)),
            Err(SimulationError::UnknownAgent(7))
        );
    }

    #[test]
    fn agent_display_matches_console_report() {
        let agent = AgentState {
            id: 3,
            position: Position::new(4, 7),
            reward: -2,
        };
        assert_eq!(agent.to_string(), "Agent No. 3 at (4, 7)\nCurrent reward: -2");
    }
}
