//! Student profile and planning priorities.

use crate::error::{AdvisorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Degree requirements that end an episode once all are met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduationRequirements {
    pub total_credits: u32,
    pub core_courses: u32,
    pub electives: u32,
}

/// The student being planned for. Graduation requirements are mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub current_gpa: f64,
    #[serde(default)]
    pub completed_courses: BTreeSet<String>,
    /// Historical grades for completed courses, on the 0-4 scale.
    #[serde(default)]
    pub grades: BTreeMap<String, f64>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default = "default_semester")]
    pub current_semester: u32,
    pub graduation_requirements: GraduationRequirements,
    #[serde(default)]
    pub fail_rate: Option<f64>,
}

fn default_semester() -> u32 {
    1
}

impl StudentProfile {
    pub fn new(current_gpa: f64, requirements: GraduationRequirements) -> Self {
        Self {
            current_gpa,
            completed_courses: BTreeSet::new(),
            grades: BTreeMap::new(),
            interests: Vec::new(),
            current_semester: default_semester(),
            graduation_requirements: requirements,
            fail_rate: None,
        }
    }

    pub fn with_completed<I, S>(mut self, courses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed_courses = courses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=4.0).contains(&self.current_gpa) {
            return Err(AdvisorError::invalid_profile(format!(
                "current_gpa {} is outside [0, 4]",
                self.current_gpa
            )));
        }
        if self.current_semester == 0 {
            return Err(AdvisorError::invalid_profile("current_semester must be at least 1"));
        }
        if self.graduation_requirements.total_credits == 0 {
            return Err(AdvisorError::invalid_profile(
                "graduation_requirements.total_credits must be positive",
            ));
        }
        if let Some(rate) = self.fail_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(AdvisorError::invalid_profile(format!(
                    "fail_rate {} is outside [0, 1]",
                    rate
                )));
            }
        }
        for (course, grade) in &self.grades {
            if !(0.0..=4.0).contains(grade) {
                return Err(AdvisorError::invalid_profile(format!(
                    "grade {} for '{}' is outside [0, 4]",
                    grade, course
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    Gpa,
    Speed,
    Interests,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadPreference {
    Low,
    #[default]
    Medium,
    High,
}

/// What the student wants the plan to optimise for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Priorities {
    #[serde(default)]
    pub focus: FocusMode,
    #[serde(default)]
    pub min_gpa: Option<f64>,
    #[serde(default)]
    pub preferred_tracks: Vec<String>,
    #[serde(default)]
    pub workload_preference: WorkloadPreference,
}

impl Priorities {
    pub fn prefers_track(&self, track: Option<&str>) -> bool {
        track.is_some_and(|track| self.preferred_tracks.iter().any(|t| t == track))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(min_gpa) = self.min_gpa {
            if !(0.0..=4.0).contains(&min_gpa) {
                return Err(AdvisorError::invalid_profile(format!(
                    "min_gpa {} is outside [0, 4]",
                    min_gpa
                )));
            }
        }
        Ok(())
    }
}
