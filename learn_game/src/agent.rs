//! Tabular Q-learning agent.

use crate::board::GameState;
use crate::config::Hyperparameters;
use crate::error::LearnError;
use crate::q_table::{self, QTable, QValues};
use itertools::Itertools;
use rand::prelude::SliceRandom;
use rand::Rng;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct QLearningAgent {
    q: QTable,
    params: Hyperparameters,
    epsilon: f64,
}

impl QLearningAgent {
    pub fn new(params: Hyperparameters) -> Self {
        Self::with_table(QTable::new(), params)
    }

    pub fn with_table(q: QTable, params: Hyperparameters) -> Self {
        QLearningAgent {
            q,
            epsilon: params.exploration_rate,
            params,
        }
    }

    pub fn q_table(&self) -> &QTable {
        &self.q
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Values for `state`, all zero if it was never visited.
    pub fn values(&self, state: &GameState) -> QValues {
        self.q.get(state).copied().unwrap_or_default()
    }

    /// Epsilon-greedy: a uniformly random valid action with probability
    /// epsilon, the greedy one otherwise.
    pub fn select_training_action(
        &mut self,
        state: &GameState,
        valid: &[usize],
        rng: &mut impl Rng,
    ) -> Result<usize, LearnError> {
        self.q.values_mut(state);
        if valid.is_empty() {
            return Err(LearnError::NoLegalActions);
        }
        if rng.gen::<f64>() < self.epsilon {
            return valid.choose(rng).copied().ok_or(LearnError::NoLegalActions);
        }
        self.select_greedy_action(state, valid, rng)
    }

    /// Highest-valued action among `valid`. Ties are broken uniformly at
    /// random so equal options are not biased towards low indices.
    pub fn select_greedy_action(
        &mut self,
        state: &GameState,
        valid: &[usize],
        rng: &mut impl Rng,
    ) -> Result<usize, LearnError> {
        let values = *self.q.values_mut(state);
        let best = valid
            .iter()
            .copied()
            .max_set_by(|&a, &b| values[a].total_cmp(&values[b]));
        best.choose(rng).copied().ok_or(LearnError::NoLegalActions)
    }

    /// Q(s, a) += alpha * (target - Q(s, a)), where the target is `reward`
    /// on terminal transitions and `reward + gamma * max Q(s')` otherwise.
    pub fn update(
        &mut self,
        state: &GameState,
        action: usize,
        reward: f64,
        next_state: &GameState,
        done: bool,
    ) {
        let best_next = self.q.values_mut(next_state).max_value();
        let target = if done {
            reward
        } else {
            reward + self.params.discount_rate * best_next
        };
        let value = &mut self.q.values_mut(state)[action];
        *value += self.params.learning_rate * (target - *value);
    }

    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.params.exploration_decay)
            .max(self.params.min_exploration_rate);
    }

    pub fn save(&self, path: &Path) -> Result<(), LearnError> {
        q_table::q_table_to_disk(path, &self.q)
    }

    /// Restores a saved table. Exploration restarts at the configured rate.
    pub fn load(path: &Path, params: Hyperparameters) -> Result<Self, LearnError> {
        let q = q_table::q_table_from_disk(path)?;
        log::info!("{:<32}{:<32}", "q-table states", q.len());
        Ok(Self::with_table(q, params))
    }
}
