//! Error types for the curriculum advisor core.

use thiserror::Error;

/// Errors raised by the environment, agent and their collaborators.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Malformed or missing student-profile fields.
    #[error("Invalid student profile: {0}")]
    InvalidProfile(String),

    /// Inconsistent settings or hyper-parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Course '{0}' is not part of the prerequisite graph.")]
    UnknownCourse(String),

    #[error("Course '{0}' appears more than once in the catalog.")]
    DuplicateCourse(String),

    /// The prerequisite graph contains at least one cycle.
    #[error("Prerequisite cycle detected among courses: {}", courses.join(", "))]
    CyclicPrerequisites { courses: Vec<String> },

    /// An action that does not fit the environment's stepping mode.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// The grade predictor failed for a course.
    #[error("Grade prediction failed for '{course}': {message}")]
    Prediction { course: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AdvisorError {
    pub fn config(message: impl Into<String>) -> Self {
        AdvisorError::Config(message.into())
    }

    pub fn invalid_profile(message: impl Into<String>) -> Self {
        AdvisorError::InvalidProfile(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
