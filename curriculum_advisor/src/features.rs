//! Fixed-shape course feature record consumed by the reward model.

use crate::graph::{Course, CourseType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseFeatures {
    pub course_id: String,
    pub credits: u32,
    pub course_type: CourseType,
    pub category: String,
    pub track: Option<String>,
    pub compulsory: bool,
    pub fail_rate: f64,
    pub average_grade: f64,
    pub workload: u8,
    pub level: u32,
    /// Fraction of the student's interests matched by category or track.
    pub interest_match: f64,
    /// Number of courses this one directly unlocks.
    pub out_degree: usize,
    /// Grade from the configured predictor, if any.
    pub predicted_grade: Option<f64>,
    /// Predicted grade, or a level-discounted GPA estimate without a predictor.
    pub expected_grade: f64,
}

impl CourseFeatures {
    pub fn from_course(course: &Course, out_degree: usize) -> Self {
        Self {
            course_id: course.id.clone(),
            credits: course.credits,
            course_type: course.course_type,
            category: course.category.clone(),
            track: course.track.clone(),
            compulsory: course.compulsory,
            fail_rate: course.fail_rate,
            average_grade: course.average_grade,
            workload: course.workload,
            level: course.level,
            interest_match: 0.0,
            out_degree,
            predicted_grade: None,
            expected_grade: course.average_grade,
        }
    }
}

/// Case-insensitive share of `interests` that occur in the category or track.
pub fn interest_match(interests: &[String], category: &str, track: Option<&str>) -> f64 {
    if interests.is_empty() {
        return 0.0;
    }
    let category = category.to_lowercase();
    let track = track.map(str::to_lowercase).unwrap_or_default();
    let matched = interests
        .iter()
        .map(|interest| interest.to_lowercase())
        .filter(|interest| !interest.is_empty())
        .filter(|interest| category.contains(interest.as_str()) || track.contains(interest.as_str()))
        .count();
    (matched as f64 / interests.len() as f64).min(1.0)
}

/// GPA estimate used when no predictor is configured: deeper courses are
/// assumed slightly harder.
pub fn estimate_grade(running_gpa: f64, level: u32) -> f64 {
    let adjustment = 0.95_f64.powi(level.saturating_sub(1) as i32);
    (running_gpa * adjustment).clamp(1.0, 4.0)
}
