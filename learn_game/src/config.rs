use crate::error::LearnError;
use crate::players::Difficulty;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const NUM_EPISODES: usize = 20_000_usize;
pub const SEED: u64 = 42;
pub const LOG_INTERVAL: usize = 1_000;

pub const LEARNING_RATE: f64 = 0.1;
pub const DISCOUNT_RATE: f64 = 0.9;
pub const EXPLORATION_RATE: f64 = 1.0;
pub const EXPLORATION_DECAY: f64 = 0.995;
pub const MIN_EXPLORATION_RATE: f64 = 0.01;

pub const WIN_REWARD: f64 = 1.0;
pub const DRAW_PENALTY: f64 = -0.1;
pub const ILLEGAL_MOVE_PENALTY: f64 = -0.5;
/// Credited to the agent's move when the opponent wins on the reply.
pub const LOSS_PENALTY: f64 = -1.0;

/// Q-learning constants fixed when the agent is built. Only the agent's live
/// exploration rate moves afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub discount_rate: f64,
    pub exploration_rate: f64,
    pub exploration_decay: f64,
    pub min_exploration_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            learning_rate: LEARNING_RATE,
            discount_rate: DISCOUNT_RATE,
            exploration_rate: EXPLORATION_RATE,
            exploration_decay: EXPLORATION_DECAY,
            min_exploration_rate: MIN_EXPLORATION_RATE,
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<(), LearnError> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(LearnError::InvalidConfig(
                "learning_rate must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.discount_rate) {
            return Err(LearnError::InvalidConfig(
                "discount_rate must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(LearnError::InvalidConfig(
                "exploration_rate must be in [0, 1]".into(),
            ));
        }
        if !(self.exploration_decay > 0.0 && self.exploration_decay <= 1.0) {
            return Err(LearnError::InvalidConfig(
                "exploration_decay must be in (0, 1]".into(),
            ));
        }
        if self.min_exploration_rate < 0.0 || self.min_exploration_rate > self.exploration_rate {
            return Err(LearnError::InvalidConfig(
                "min_exploration_rate must be in [0, exploration_rate]".into(),
            ));
        }
        Ok(())
    }
}

/// A block of consecutive episodes played against one opponent difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub episodes: usize,
    pub opponent: Difficulty,
}

impl Phase {
    pub fn new(name: &str, episodes: usize, opponent: Difficulty) -> Self {
        Phase {
            name: name.to_owned(),
            episodes,
            opponent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub hyperparameters: Hyperparameters,
    pub phases: Vec<Phase>,
    pub seed: u64,
    pub log_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            hyperparameters: Hyperparameters::default(),
            phases: Self::schedule(NUM_EPISODES),
            seed: SEED,
            log_interval: LOG_INTERVAL,
        }
    }
}

impl TrainingConfig {
    /// Random exploration first, then blocking, then forking opponents
    /// (40% / 30% / 30% of `episodes`).
    pub fn schedule(episodes: usize) -> Vec<Phase> {
        let random = episodes * 4 / 10;
        let blocking = episodes * 3 / 10;
        let forking = episodes - random - blocking;
        vec![
            Phase::new("random exploration", random, Difficulty::Random),
            Phase::new("blocking opponent", blocking, Difficulty::Blocking),
            Phase::new("forking opponent", forking, Difficulty::Forking),
        ]
    }

    pub fn single_phase(episodes: usize, opponent: Difficulty) -> Vec<Phase> {
        vec![Phase::new(opponent.as_str(), episodes, opponent)]
    }

    pub fn total_episodes(&self) -> usize {
        self.phases.iter().map(|phase| phase.episodes).sum()
    }

    /// Load a training configuration from a JSON file. Missing fields fall
    /// back to their defaults.
    pub fn load(path: &Path) -> Result<Self, LearnError> {
        let content = fs::read_to_string(path)?;
        let config: TrainingConfig = serde_json::from_str(&content)
            .map_err(|e| LearnError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LearnError> {
        self.hyperparameters.validate()?;
        if self.total_episodes() == 0 {
            return Err(LearnError::InvalidConfig(
                "training needs at least one episode".into(),
            ));
        }
        if self.log_interval == 0 {
            return Err(LearnError::InvalidConfig("log_interval must be > 0".into()));
        }
        Ok(())
    }
}
