//! Reward model for course and semester choices.
//!
//! The additive stage scores a single course; the multiplicative stage
//! scales that score by the student's focus and track preference. Terminal
//! magnitudes for graduation and failure live in [`TerminalRewards`].

use crate::error::{AdvisorError, Result};
use crate::features::CourseFeatures;
use crate::profile::{FocusMode, Priorities, StudentProfile, WorkloadPreference};
use serde::{Deserialize, Serialize};

/// Named weighting presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RewardScheme {
    /// Out-degree dominates, with a quadratic level-mismatch penalty.
    #[default]
    UnlockDriven,
    /// GPA and interest weighted, with a workload term and no level penalty.
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub grade: f64,
    /// Grade weight used when the student's GPA is below 3.0.
    pub low_gpa_grade: f64,
    pub interest: f64,
    pub unlocks: f64,
    pub unlocks_normalizer: f64,
    pub level_mismatch: f64,
    pub workload: f64,
    pub compulsory_bonus: f64,
    pub track_bonus: f64,
}

impl RewardScheme {
    pub fn weights(self) -> RewardWeights {
        match self {
            RewardScheme::UnlockDriven => RewardWeights {
                grade: 0.1,
                low_gpa_grade: 0.1,
                interest: 0.1,
                unlocks: 0.3,
                unlocks_normalizer: 1.0,
                level_mismatch: 0.6,
                workload: 0.0,
                compulsory_bonus: 0.1,
                track_bonus: 0.15,
            },
            RewardScheme::Balanced => RewardWeights {
                grade: 0.5,
                low_gpa_grade: 0.3,
                interest: 0.3,
                unlocks: 0.15,
                unlocks_normalizer: 10.0,
                level_mismatch: 0.0,
                workload: 0.05,
                compulsory_bonus: 0.1,
                track_bonus: 0.15,
            },
        }
    }
}

/// Per-weight overrides applied on top of the active scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightOverrides {
    pub grade: Option<f64>,
    pub low_gpa_grade: Option<f64>,
    pub interest: Option<f64>,
    pub unlocks: Option<f64>,
    pub unlocks_normalizer: Option<f64>,
    pub level_mismatch: Option<f64>,
    pub workload: Option<f64>,
    pub compulsory_bonus: Option<f64>,
    pub track_bonus: Option<f64>,
}

impl WeightOverrides {
    fn apply(&self, mut weights: RewardWeights) -> RewardWeights {
        let fields = [
            (self.grade, &mut weights.grade),
            (self.low_gpa_grade, &mut weights.low_gpa_grade),
            (self.interest, &mut weights.interest),
            (self.unlocks, &mut weights.unlocks),
            (self.unlocks_normalizer, &mut weights.unlocks_normalizer),
            (self.level_mismatch, &mut weights.level_mismatch),
            (self.workload, &mut weights.workload),
            (self.compulsory_bonus, &mut weights.compulsory_bonus),
            (self.track_bonus, &mut weights.track_bonus),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        weights
    }
}

/// Episode-ending reward magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRewards {
    pub graduation_bonus: f64,
    /// Amount the graduation bonus shrinks per semester consumed.
    pub semester_cost: f64,
    /// Magnitude of the penalty for running out of semesters or options.
    pub failure_penalty: f64,
    /// Magnitude of the penalty when training cannot fill a semester plan.
    pub empty_plan_penalty: f64,
}

impl Default for TerminalRewards {
    fn default() -> Self {
        Self {
            graduation_bonus: 200.0,
            semester_cost: 10.0,
            failure_penalty: 300.0,
            empty_plan_penalty: 50.0,
        }
    }
}

impl TerminalRewards {
    pub fn graduation(&self, semesters_used: u32) -> f64 {
        (self.graduation_bonus - self.semester_cost * f64::from(semesters_used)).max(0.0)
    }

    pub fn failure(&self) -> f64 {
        -self.failure_penalty
    }

    pub fn empty_plan(&self) -> f64 {
        -self.empty_plan_penalty
    }

    pub fn validate(&self) -> Result<()> {
        let values = [
            self.graduation_bonus,
            self.semester_cost,
            self.failure_penalty,
            self.empty_plan_penalty,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(AdvisorError::config(
                "terminal reward magnitudes must be finite and non-negative",
            ));
        }
        if self.failure_penalty <= self.graduation_bonus {
            return Err(AdvisorError::config(format!(
                "failure_penalty ({}) must exceed graduation_bonus ({})",
                self.failure_penalty, self.graduation_bonus
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub scheme: RewardScheme,
    #[serde(default)]
    pub overrides: WeightOverrides,
    pub focus_boost: f64,
    pub track_multiplier: f64,
    #[serde(default)]
    pub terminal: TerminalRewards,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            scheme: RewardScheme::default(),
            overrides: WeightOverrides::default(),
            focus_boost: 0.5,
            track_multiplier: 1.2,
            terminal: TerminalRewards::default(),
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<()> {
        self.terminal.validate()?;
        if self.track_multiplier <= 0.0 {
            return Err(AdvisorError::config("track_multiplier must be positive"));
        }
        if self.focus_boost < 0.0 {
            return Err(AdvisorError::config("focus_boost cannot be negative"));
        }
        let weights = self.overrides.apply(self.scheme.weights());
        if weights.unlocks_normalizer <= 0.0 {
            return Err(AdvisorError::config("unlocks_normalizer must be positive"));
        }
        Ok(())
    }
}

/// Pure scoring function over course features and student context.
#[derive(Debug, Clone)]
pub struct RewardModel {
    scheme: RewardScheme,
    weights: RewardWeights,
    focus_boost: f64,
    track_multiplier: f64,
    terminal: TerminalRewards,
}

impl Default for RewardModel {
    fn default() -> Self {
        Self::new(&RewardConfig::default())
    }
}

impl RewardModel {
    pub fn new(config: &RewardConfig) -> Self {
        Self {
            scheme: config.scheme,
            weights: config.overrides.apply(config.scheme.weights()),
            focus_boost: config.focus_boost,
            track_multiplier: config.track_multiplier,
            terminal: config.terminal.clone(),
        }
    }

    pub fn scheme(&self) -> RewardScheme {
        self.scheme
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    pub fn terminal(&self) -> &TerminalRewards {
        &self.terminal
    }

    /// Score taking one course in `semester` with the given running GPA.
    pub fn reward(
        &self,
        features: &CourseFeatures,
        profile: &StudentProfile,
        priorities: &Priorities,
        running_gpa: f64,
        semester: u32,
    ) -> f64 {
        let base = self.base_reward(features, profile, priorities, running_gpa, semester);
        base * self.priority_factor(features, priorities)
    }

    pub fn base_reward(
        &self,
        features: &CourseFeatures,
        profile: &StudentProfile,
        priorities: &Priorities,
        running_gpa: f64,
        semester: u32,
    ) -> f64 {
        let w = &self.weights;

        let grade_weight = if profile.current_gpa.min(running_gpa) >= 3.0 {
            w.grade
        } else {
            w.low_gpa_grade
        };
        let grade = grade_weight * features.expected_grade / 4.0;
        let interest = w.interest * features.interest_match;
        let unlocks = w.unlocks * features.out_degree as f64 / w.unlocks_normalizer;

        let ideal_level = f64::from(semester / 2 + 1);
        let gap = f64::from(features.level) - ideal_level;
        let level_penalty = -w.level_mismatch * gap * gap;

        let workload = w.workload * workload_fit(features.workload, priorities.workload_preference);
        let compulsory = if features.compulsory { w.compulsory_bonus } else { 0.0 };
        let track = if priorities.prefers_track(features.track.as_deref()) {
            w.track_bonus
        } else {
            0.0
        };

        grade + interest + unlocks + level_penalty + workload + compulsory + track
    }

    pub fn priority_factor(&self, features: &CourseFeatures, priorities: &Priorities) -> f64 {
        let mut factor = 1.0;
        match priorities.focus {
            FocusMode::Gpa => factor += self.focus_boost * features.expected_grade / 4.0,
            FocusMode::Speed => factor += self.focus_boost * 0.1 * features.out_degree as f64,
            FocusMode::Interests => factor += self.focus_boost * features.interest_match,
            FocusMode::Balanced => {}
        }
        if priorities.prefers_track(features.track.as_deref()) {
            factor *= self.track_multiplier;
        }
        factor
    }
}

/// How well a 1-5 workload rating suits the preference, in [0, 2].
fn workload_fit(workload: u8, preference: WorkloadPreference) -> f64 {
    let workload = f64::from(workload);
    match preference {
        WorkloadPreference::Low => (6.0 - workload) / 5.0 * 2.0,
        WorkloadPreference::High => (workload - 1.0) / 5.0,
        WorkloadPreference::Medium => (3.0 - (workload - 3.0).abs()) / 3.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CourseType;
    use crate::profile::GraduationRequirements;

    fn features(id: &str, out_degree: usize, level: u32) -> CourseFeatures {
        CourseFeatures {
            course_id: id.to_string(),
            credits: 3,
            course_type: CourseType::Core,
            category: "Computer Science".to_string(),
            track: None,
            compulsory: false,
            fail_rate: 0.1,
            average_grade: 3.0,
            workload: 3,
            level,
            interest_match: 0.0,
            out_degree,
            predicted_grade: Some(3.0),
            expected_grade: 3.0,
        }
    }

    fn profile() -> StudentProfile {
        StudentProfile::new(
            3.4,
            GraduationRequirements {
                total_credits: 12,
                core_courses: 4,
                electives: 0,
            },
        )
    }

    #[test]
    fn test_unlocking_course_outscores_leaf() {
        let model = RewardModel::default();
        let priorities = Priorities::default();
        let gateway = model.reward(&features("GATE", 4, 1), &profile(), &priorities, 3.4, 1);
        let leaf = model.reward(&features("LEAF", 0, 1), &profile(), &priorities, 3.4, 1);
        assert!(gateway > leaf);
        assert!((gateway - leaf - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_level_mismatch_is_quadratic_and_symmetric() {
        let model = RewardModel::default();
        let priorities = Priorities::default();
        // Semester 3 -> ideal level 2.
        let on_level = model.base_reward(&features("X", 0, 2), &profile(), &priorities, 3.4, 3);
        let below = model.base_reward(&features("X", 0, 1), &profile(), &priorities, 3.4, 3);
        let above = model.base_reward(&features("X", 0, 3), &profile(), &priorities, 3.4, 3);
        let far_above = model.base_reward(&features("X", 0, 4), &profile(), &priorities, 3.4, 3);

        assert!((on_level - below - 0.6).abs() < 1e-9);
        assert!((below - above).abs() < 1e-9);
        assert!((on_level - far_above - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_focus_and_track_scale_the_base_reward() {
        let model = RewardModel::default();
        let mut course = features("TRACKED", 2, 1);
        course.track = Some("Big_Data".to_string());

        let speed = Priorities {
            focus: FocusMode::Speed,
            preferred_tracks: vec!["Big_Data".to_string()],
            ..Priorities::default()
        };
        let factor = model.priority_factor(&course, &speed);
        assert!((factor - (1.0 + 0.5 * 0.1 * 2.0) * 1.2).abs() < 1e-9);

        let balanced = Priorities::default();
        assert_eq!(model.priority_factor(&course, &balanced), 1.0);
    }

    #[test]
    fn test_balanced_scheme_uses_workload_and_overrides() {
        let config = RewardConfig {
            scheme: RewardScheme::Balanced,
            overrides: WeightOverrides {
                interest: Some(0.0),
                ..WeightOverrides::default()
            },
            ..RewardConfig::default()
        };
        let model = RewardModel::new(&config);
        assert_eq!(model.weights().interest, 0.0);
        assert_eq!(model.weights().level_mismatch, 0.0);

        let light = Priorities {
            workload_preference: WorkloadPreference::Low,
            ..Priorities::default()
        };
        let mut easy = features("EASY", 0, 1);
        easy.workload = 1;
        let mut hard = features("HARD", 0, 1);
        hard.workload = 5;
        assert!(
            model.reward(&easy, &profile(), &light, 3.4, 1) > model.reward(&hard, &profile(), &light, 3.4, 1)
        );
    }

    #[test]
    fn test_reward_is_deterministic() {
        let model = RewardModel::default();
        let course = features("X", 3, 2);
        let first = model.reward(&course, &profile(), &Priorities::default(), 3.1, 4);
        let second = model.reward(&course, &profile(), &Priorities::default(), 3.1, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_terminal_rewards() {
        let terminal = TerminalRewards::default();
        assert!(terminal.graduation(4) > terminal.graduation(5));
        assert_eq!(terminal.graduation(50), 0.0);
        assert!(terminal.failure() < -terminal.graduation(0));
        assert!(terminal.validate().is_ok());

        let inverted = TerminalRewards {
            failure_penalty: 100.0,
            ..TerminalRewards::default()
        };
        assert!(matches!(inverted.validate(), Err(AdvisorError::Config(_))));
    }
}
