//! Episode loops that drive the environment and the agent.

use crate::agent::QLearningAgent;
use crate::environment::{CurriculumEnvironment, EpisodeOutcome, StepMode};
use crate::error::{AdvisorError, Result};
use crate::reward::RewardScheme;
use crate::state::StateKey;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub episodes: usize,
    /// Emit a progress line every this many episodes.
    pub log_every: usize,
    /// Episodes averaged for the recent-reward figure.
    pub window: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            log_every: 100,
            window: 100,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(AdvisorError::config("training.episodes must be at least 1"));
        }
        if self.log_every == 0 || self.window == 0 {
            return Err(AdvisorError::config(
                "training.log_every and training.window must be positive",
            ));
        }
        Ok(())
    }
}

/// Outcome of one simulated episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub reward: f64,
    pub outcome: EpisodeOutcome,
    pub steps: usize,
    pub credits: u32,
    pub gpa: f64,
    pub semester: u32,
}

impl EpisodeSummary {
    fn from_env(env: &CurriculumEnvironment, reward: f64, outcome: EpisodeOutcome, steps: usize) -> Self {
        Self {
            reward,
            outcome,
            steps,
            credits: env.credits(),
            gpa: env.gpa(),
            semester: env.semester(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub step_mode: StepMode,
    pub reward_scheme: RewardScheme,
    pub episodes: usize,
    pub graduated: usize,
    pub mean_reward: f64,
    pub recent_mean_reward: f64,
    pub best_reward: f64,
    pub final_epsilon: f64,
    pub states: usize,
    pub entries: usize,
}

impl TrainingReport {
    pub fn graduation_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.graduated as f64 / self.episodes as f64
        }
    }
}

/// Run `config.episodes` episodes in the environment's step mode.
#[instrument(skip(env, agent), fields(mode = ?env.step_mode()))]
pub fn train(
    env: &mut CurriculumEnvironment,
    agent: &mut QLearningAgent,
    config: &TrainingConfig,
) -> Result<TrainingReport> {
    config.validate()?;
    info!(
        episodes = config.episodes,
        scheme = ?env.reward_model().scheme(),
        "Starting training"
    );

    let mut total_reward = 0.0;
    let mut best_reward = f64::NEG_INFINITY;
    let mut graduated = 0;
    let mut recent: VecDeque<f64> = VecDeque::with_capacity(config.window);

    for episode in 1..=config.episodes {
        let summary = match env.step_mode() {
            StepMode::SingleCourse => run_single_course_episode(env, agent)?,
            StepMode::Semester => run_semester_episode(env, agent)?,
        };
        agent.decay_epsilon();

        total_reward += summary.reward;
        best_reward = best_reward.max(summary.reward);
        if summary.outcome == EpisodeOutcome::Graduated {
            graduated += 1;
        }
        if recent.len() == config.window {
            recent.pop_front();
        }
        recent.push_back(summary.reward);

        debug!(episode, reward = summary.reward, outcome = ?summary.outcome, "Episode complete");
        if episode % config.log_every == 0 {
            info!(
                episode,
                recent_mean_reward = mean(&recent),
                graduated,
                epsilon = agent.epsilon(),
                states = agent.q_table().state_count(),
                "Training progress"
            );
        }
    }

    let report = TrainingReport {
        step_mode: env.step_mode(),
        reward_scheme: env.reward_model().scheme(),
        episodes: config.episodes,
        graduated,
        mean_reward: total_reward / config.episodes as f64,
        recent_mean_reward: mean(&recent),
        best_reward,
        final_epsilon: agent.epsilon(),
        states: agent.q_table().state_count(),
        entries: agent.q_table().entry_count(),
    };
    info!(
        graduated = report.graduated,
        mean_reward = report.mean_reward,
        states = report.states,
        "Training finished"
    );
    Ok(report)
}

/// One episode where every step takes a single course.
pub fn run_single_course_episode(
    env: &mut CurriculumEnvironment,
    agent: &mut QLearningAgent,
) -> Result<EpisodeSummary> {
    let mut state = env.reset();
    let mut reward = 0.0;
    let mut steps = 0;

    loop {
        let valid = env.valid_actions();
        // Only reachable at reset: steps that exhaust the actions are done.
        let Some(action) = agent.choose_action(&state, &valid) else {
            if env.is_graduated() {
                return Ok(EpisodeSummary::from_env(env, reward, EpisodeOutcome::Graduated, steps));
            }
            reward += env.reward_model().terminal().empty_plan();
            debug!(semester = env.semester(), "No eligible course ends the episode");
            return Ok(EpisodeSummary::from_env(
                env,
                reward,
                EpisodeOutcome::NoValidActions,
                steps,
            ));
        };

        let transition = env.step_course(&action)?;
        let next_valid = if transition.done {
            Vec::new()
        } else {
            env.valid_actions()
        };
        agent.update(&state, &action, transition.reward, &transition.next_state, &next_valid);

        reward += transition.reward;
        steps += 1;
        if transition.done {
            return Ok(EpisodeSummary::from_env(env, reward, transition.info.outcome, steps));
        }
        state = transition.next_state;
    }
}

/// One episode where every step commits a semester plan built course by
/// course.
pub fn run_semester_episode(
    env: &mut CurriculumEnvironment,
    agent: &mut QLearningAgent,
) -> Result<EpisodeSummary> {
    let capacity = env.config().semester_capacity;
    let mut base = env.reset();
    let mut reward = 0.0;
    let mut steps = 0;

    loop {
        let mut candidates = env.valid_actions();
        let mut plan: Vec<String> = Vec::with_capacity(capacity);
        let mut last_pick: Option<(StateKey, String)> = None;

        while plan.len() < capacity {
            let plan_state = base.with_plan(&plan);
            let Some(pick) = agent.choose_action(&plan_state, &candidates) else {
                break;
            };
            let shaping = env.course_reward(&pick)?;
            candidates.retain(|candidate| candidate != &pick);
            plan.push(pick.clone());
            agent.update(&plan_state, &pick, shaping, &base.with_plan(&plan), &candidates);
            last_pick = Some((plan_state, pick));
        }

        let Some((last_state, last_action)) = last_pick else {
            reward += env.reward_model().terminal().empty_plan();
            debug!(semester = env.semester(), "Empty semester plan ends the episode");
            return Ok(EpisodeSummary::from_env(
                env,
                reward,
                EpisodeOutcome::NoValidActions,
                steps,
            ));
        };

        let transition = env.step(&plan)?;
        let next_valid = if transition.done {
            Vec::new()
        } else {
            env.valid_actions()
        };
        agent.update(
            &last_state,
            &last_action,
            transition.terminal_reward,
            &transition.next_state,
            &next_valid,
        );

        reward += transition.reward;
        steps += 1;
        if transition.done {
            return Ok(EpisodeSummary::from_env(env, reward, transition.info.outcome, steps));
        }
        base = transition.next_state;
    }
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
