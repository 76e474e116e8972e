use std::{collections::VecDeque, iter};

use rand::{Rng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    Direction, SimulationError,
    environment::{Decision, Entity, EnvironmentView},
};

/// Number of equally likely outcomes in the attack draw; exactly one of them
/// is an attack.
pub const ATTACK_ODDS: u32 = 21;

/// Extra copies of a direction added to the pool when food sits next door.
pub const FOOD_BIAS: usize = 5;

/// Trait defining how an agent chooses what to do.
/// Policies decide based on the EnvironmentView and the shared random source.
pub trait Policy {
    /// Determines the decision the agent makes this level.
    /// `&mut self` allows a policy to keep internal state between levels.
    fn decide(
        &mut self,
        view: &EnvironmentView,
        rng: &mut StdRng,
    ) -> Result<Decision, SimulationError>;
}

/// The default hand-coded heuristic: rarely attacks, wanders at random and
/// leans strongly towards adjacent food.
#[derive(Debug, Default, Clone, Copy)]
pub struct FoodSeekingPolicy;

impl FoodSeekingPolicy {
    /// Builds the weighted pool of directions to draw from.
    ///
    /// Every direction whose neighbor is on the board appears once, in
    /// [`Direction::ALL`] order. Each of those whose neighbor holds food is
    /// then appended [`FOOD_BIAS`] more times.
    pub fn candidate_directions(view: &EnvironmentView) -> Vec<Direction> {
        let location = view.location();
        let valid: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|direction| {
                location
                    .step(*direction)
                    .is_some_and(|neighbor| view.contains(neighbor))
            })
            .collect();

        let mut pool = valid.clone();
        for direction in &valid {
            if let Some(neighbor) = location.step(*direction) {
                if let Entity::Food(_) = view.entity_at(neighbor) {
                    pool.extend(iter::repeat_n(*direction, FOOD_BIAS));
                }
            }
        }
        pool
    }
}

impl Policy for FoodSeekingPolicy {
    fn decide(
        &mut self,
        view: &EnvironmentView,
        rng: &mut StdRng,
    ) -> Result<Decision, SimulationError> {
        let attack = rng.random_range(0..ATTACK_ODDS) == 0;
        let pool = Self::candidate_directions(view);
        let direction = *pool
            .choose(rng)
            .ok_or(SimulationError::EmptyDirectionPool {
                agent: view.agent_state.id,
                position: view.location(),
            })?;
        Ok(Decision { attack, direction })
    }
}

/// Replays a fixed list of decisions, one per level, without touching the
/// random source.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPolicy {
    script: VecDeque<Decision>,
}

impl ScriptedPolicy {
    pub fn new(script: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Decisions not yet played.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Policy for ScriptedPolicy {
    fn decide(
        &mut self,
        view: &EnvironmentView,
        _rng: &mut StdRng,
    ) -> Result<Decision, SimulationError> {
        self.script
            .pop_front()
            .ok_or(SimulationError::ScriptExhausted(view.agent_state.id))
    }
}
