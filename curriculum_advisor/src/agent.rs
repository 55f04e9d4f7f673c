//! Epsilon-greedy tabular Q-learning agent.

use crate::error::{AdvisorError, Result};
use crate::qtable::QTable;
use crate::state::StateKey;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Hyper-parameters for the Q-learning agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QLearningConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64, // exploration rate
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            epsilon: 0.3,
            epsilon_decay: 1.0,
            min_epsilon: 0.01,
            seed: None,
        }
    }
}

impl QLearningConfig {
    pub fn validate(&self) -> Result<()> {
        let unit_open = |value: f64| value > 0.0 && value <= 1.0;
        if !unit_open(self.learning_rate) {
            return Err(AdvisorError::config(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !unit_open(self.discount_factor) {
            return Err(AdvisorError::config(format!(
                "discount_factor must be in (0, 1], got {}",
                self.discount_factor
            )));
        }
        if !unit_open(self.epsilon_decay) {
            return Err(AdvisorError::config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) || !(0.0..=1.0).contains(&self.min_epsilon) {
            return Err(AdvisorError::config("epsilon and min_epsilon must be in [0, 1]"));
        }
        if self.min_epsilon > self.epsilon {
            return Err(AdvisorError::config("min_epsilon cannot exceed epsilon"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStats {
    pub steps: u64,
    pub epsilon: f64,
    pub states: usize,
    pub entries: usize,
    pub learning_rate: f64,
    pub discount_factor: f64,
}

pub struct QLearningAgent {
    config: QLearningConfig,
    epsilon: f64,
    q_table: QTable,
    rng: StdRng,
    steps: u64,
}

impl QLearningAgent {
    pub fn new(config: QLearningConfig) -> Result<Self> {
        Self::with_table(config, QTable::new())
    }

    /// Resume learning (or act greedily) from an existing table.
    pub fn with_table(config: QLearningConfig, q_table: QTable) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(?config, states = q_table.state_count(), "Q-learning agent created");
        Ok(Self {
            epsilon: config.epsilon,
            config,
            q_table,
            rng,
            steps: 0,
        })
    }

    pub fn load(config: QLearningConfig, path: &Path) -> Result<Self> {
        let q_table = QTable::load(path)?;
        Self::with_table(config, q_table)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.q_table.save(path)
    }

    /// Epsilon-greedy pick among `valid`; `None` when nothing is valid.
    ///
    /// Exploitation returns the first action holding the maximum value, so
    /// the order of `valid` breaks ties.
    pub fn choose_action<S: AsRef<str>>(&mut self, state: &StateKey, valid: &[S]) -> Option<String> {
        if valid.is_empty() {
            return None;
        }

        if self.rng.gen::<f64>() < self.epsilon {
            return valid
                .choose(&mut self.rng)
                .map(|action| action.as_ref().to_string());
        }

        let mut best: Option<(&str, f64)> = None;
        for action in valid {
            let action = action.as_ref();
            let value = self.q_table.get(state, action);
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((action, value)),
            }
        }
        best.map(|(action, _)| action.to_string())
    }

    /// One Bellman backup; returns the new value of `(state, action)`.
    pub fn update<S: AsRef<str>>(
        &mut self,
        state: &StateKey,
        action: &str,
        reward: f64,
        next_state: &StateKey,
        next_valid: &[S],
    ) -> f64 {
        let current = self.q_table.get(state, action);
        let max_next = self.q_table.max_value(next_state, next_valid);
        let target = reward + self.config.discount_factor * max_next;
        let updated = current + self.config.learning_rate * (target - current);

        self.q_table.set(state, action, updated);
        self.steps += 1;

        debug!(
            state = %state,
            action,
            reward,
            current,
            updated,
            "Q-update"
        );
        updated
    }

    pub fn q_value(&self, state: &StateKey, action: &str) -> f64 {
        self.q_table.get(state, action)
    }

    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn config(&self) -> &QLearningConfig {
        &self.config
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            steps: self.steps,
            epsilon: self.epsilon,
            states: self.q_table.state_count(),
            entries: self.q_table.entry_count(),
            learning_rate: self.config.learning_rate,
            discount_factor: self.config.discount_factor,
        }
    }
}
