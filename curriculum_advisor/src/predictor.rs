//! Grade prediction collaborators.
//!
//! The environment asks a [`GradePredictor`] for the grade a student is
//! expected to earn in a course. Model training happens elsewhere; this
//! module only applies already-fitted models.

use crate::error::AdvisorError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const MIN_GRADE: f64 = 0.0;
pub const MAX_GRADE: f64 = 4.0;

/// Inputs shared by every predictor implementation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionFeatures {
    pub credits: f64,
    pub fail_rate: f64,
    pub average_grade: f64,
    pub student_gpa: f64,
    pub student_fail_rate: f64,
    pub course_code: u32,
}

/// Maps course and student statistics to a grade on the 0-4 scale.
pub trait GradePredictor: Send + Sync {
    fn predict(&self, features: &PredictionFeatures) -> Result<f64>;
}

impl<F> GradePredictor for F
where
    F: Fn(&PredictionFeatures) -> Result<f64> + Send + Sync,
{
    fn predict(&self, features: &PredictionFeatures) -> Result<f64> {
        self(features)
    }
}

pub fn clamp_grade(grade: f64) -> f64 {
    grade.clamp(MIN_GRADE, MAX_GRADE)
}

/// Blends the course's historical average with the student's running GPA
/// and discounts by both fail rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalGradePredictor {
    pub course_weight: f64,
    pub student_weight: f64,
    pub fail_rate_penalty: f64,
    pub student_fail_penalty: f64,
}

impl Default for HistoricalGradePredictor {
    fn default() -> Self {
        Self {
            course_weight: 0.5,
            student_weight: 0.5,
            fail_rate_penalty: 1.0,
            student_fail_penalty: 0.5,
        }
    }
}

impl HistoricalGradePredictor {
    pub fn validate(&self) -> crate::error::Result<()> {
        let weights = [
            self.course_weight,
            self.student_weight,
            self.fail_rate_penalty,
            self.student_fail_penalty,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AdvisorError::config(
                "predictor.historical weights must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

impl GradePredictor for HistoricalGradePredictor {
    fn predict(&self, features: &PredictionFeatures) -> Result<f64> {
        let total_weight = self.course_weight + self.student_weight;
        let blended = if total_weight > 0.0 {
            (self.course_weight * features.average_grade + self.student_weight * features.student_gpa)
                / total_weight
        } else {
            features.student_gpa
        };
        let grade = blended
            - self.fail_rate_penalty * features.fail_rate
            - self.student_fail_penalty * features.student_fail_rate;
        Ok(clamp_grade(grade))
    }
}

/// A fitted linear regression over [`PredictionFeatures`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearGradePredictor {
    pub intercept: f64,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub fail_rate: f64,
    #[serde(default)]
    pub average_grade: f64,
    #[serde(default)]
    pub student_gpa: f64,
    #[serde(default)]
    pub student_fail_rate: f64,
    #[serde(default)]
    pub course_code: f64,
}

impl LinearGradePredictor {
    /// Load coefficients exported by the model-training pipeline.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read grade model: {:?}", path))?;
        let model: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse grade model: {:?}", path))?;
        info!(path = ?path, "Linear grade model loaded");
        Ok(model)
    }
}

impl GradePredictor for LinearGradePredictor {
    fn predict(&self, features: &PredictionFeatures) -> Result<f64> {
        let grade = self.intercept
            + self.credits * features.credits
            + self.fail_rate * features.fail_rate
            + self.average_grade * features.average_grade
            + self.student_gpa * features.student_gpa
            + self.student_fail_rate * features.student_fail_rate
            + self.course_code * f64::from(features.course_code);
        Ok(clamp_grade(grade))
    }
}
