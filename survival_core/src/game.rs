use std::collections::{BTreeMap, HashMap};

use log::{info, trace};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    EntityId, SimulationError,
    agent::{FoodSeekingPolicy, Policy},
    config::SimulationConfig,
    environment::{ActionResult, Decision, Environment},
};

/// Rewards of every agent at one point in time.
pub type RewardSnapshot = BTreeMap<EntityId, i64>;

/// One agent's action within a level, in the order agents acted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub agent: EntityId,
    pub decision: Decision,
    pub result: ActionResult,
}

/// Reward snapshots and turn logs accumulated over a run.
///
/// `snapshots()[0]` is taken before the first level, so after `M` levels
/// there are `M + 1` snapshots and `M` turn logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationHistory {
    rewards: Vec<RewardSnapshot>,
    levels: Vec<Vec<Turn>>,
}

impl SimulationHistory {
    fn new(initial: RewardSnapshot) -> Self {
        Self {
            rewards: vec![initial],
            levels: Vec::new(),
        }
    }

    fn record(&mut self, snapshot: RewardSnapshot, turns: Vec<Turn>) {
        self.rewards.push(snapshot);
        self.levels.push(turns);
    }

    pub fn snapshots(&self) -> &[RewardSnapshot] {
        &self.rewards
    }

    /// Turn logs, one per completed level.
    pub fn levels(&self) -> &[Vec<Turn>] {
        &self.levels
    }

    pub fn last_level(&self) -> Option<&[Turn]> {
        self.levels.last().map(Vec::as_slice)
    }

    /// Decision each agent made in the given level (0-based).
    pub fn decisions(&self, level: usize) -> Option<BTreeMap<EntityId, Decision>> {
        self.levels.get(level).map(|turns| {
            turns
                .iter()
                .map(|turn| (turn.agent, turn.decision))
                .collect()
        })
    }

    /// Mean reward of each agent over all snapshots, including the initial one.
    pub fn average_rewards(&self) -> BTreeMap<EntityId, f64> {
        let mut totals: BTreeMap<EntityId, i64> = BTreeMap::new();
        for snapshot in &self.rewards {
            for (agent, reward) in snapshot {
                *totals.entry(*agent).or_default() += reward;
            }
        }
        let count = self.rewards.len() as f64;
        totals
            .into_iter()
            .map(|(agent, total)| (agent, total as f64 / count))
            .collect()
    }
}

/// Drives the simulation one level at a time.
pub struct Game {
    environment: Environment,
    policies: HashMap<EntityId, Box<dyn Policy>>,
    rng: StdRng,
    history: SimulationHistory,
    /// First error raised by a level; the run is over once this is set.
    failed: Option<SimulationError>,
}

impl Game {
    /// Wraps a populated environment. Every agent starts with the
    /// [`FoodSeekingPolicy`].
    pub fn new(environment: Environment, rng: StdRng) -> Self {
        let policies = environment
            .agents()
            .iter()
            .map(|agent| (agent.id, Box::new(FoodSeekingPolicy) as Box<dyn Policy>))
            .collect();
        let history = SimulationHistory::new(snapshot(&environment));
        Game {
            environment,
            policies,
            rng,
            history,
            failed: None,
        }
    }

    /// Seeds the shared random source, scatters the world and wraps it.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let environment = Environment::populate(config, &mut rng)?;
        Ok(Game::new(environment, rng))
    }

    /// Replaces the policy of one agent.
    pub fn set_policy(
        &mut self,
        agent_id: EntityId,
        policy: Box<dyn Policy>,
    ) -> Result<(), SimulationError> {
        match self.policies.get_mut(&agent_id) {
            Some(slot) => {
                *slot = policy;
                Ok(())
            }
            None => Err(SimulationError::UnknownAgent(agent_id)),
        }
    }

    /// Runs one level: every agent acts once, in an order drawn uniformly at
    /// random, and sees the effects of the agents that acted before it.
    ///
    /// On error the level is abandoned and nothing is appended to the history.
    /// Agents that acted before the failure keep their changes, so the run is
    /// over: every later call returns the same error.
    pub fn level_up(&mut self) -> Result<&[Turn], SimulationError> {
        if let Some(error) = &self.failed {
            return Err(error.clone());
        }
        let turns = match self.play_turns() {
            Ok(turns) => turns,
            Err(error) => {
                self.failed = Some(error.clone());
                return Err(error);
            }
        };

        self.history.record(snapshot(&self.environment), turns);
        info!(
            "Level {} complete: {:?}",
            self.level(),
            self.history.snapshots().last()
        );
        Ok(self.history.last_level().unwrap_or_default())
    }

    fn play_turns(&mut self) -> Result<Vec<Turn>, SimulationError> {
        let mut remaining: Vec<EntityId> =
            self.environment.agents().iter().map(|a| a.id).collect();
        let mut turns = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let agent_id = remaining.remove(self.rng.random_range(0..remaining.len()));
            trace!("Agent {} takes its turn", agent_id);

            let policy = self
                .policies
                .get_mut(&agent_id)
                .ok_or(SimulationError::UnknownAgent(agent_id))?;
            let view = self.environment.view(agent_id)?;
            let decision = policy.decide(&view, &mut self.rng)?;
            let result = self.environment.process_action(agent_id, decision)?;
            turns.push(Turn {
                agent: agent_id,
                decision,
                result,
            });
        }
        Ok(turns)
    }

    /// The error that ended the run, if any.
    pub fn failure(&self) -> Option<&SimulationError> {
        self.failed.as_ref()
    }

    /// Number of completed levels.
    pub fn level(&self) -> usize {
        self.history.levels().len()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn history(&self) -> &SimulationHistory {
        &self.history
    }
}

fn snapshot(environment: &Environment) -> RewardSnapshot {
    environment
        .agents()
        .iter()
        .map(|agent| (agent.id, agent.reward))
        .collect()
}
