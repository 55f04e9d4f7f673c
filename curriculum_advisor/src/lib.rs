//! Curriculum Advisor - Core Library
//!
//! Plans multi-semester course sequences with tabular Q-learning over a
//! course prerequisite network.

pub mod agent;
pub mod cli;
pub mod environment;
pub mod error;
pub mod features;
pub mod graph;
pub mod policy;
pub mod predictor;
pub mod profile;
pub mod qtable;
pub mod reward;
pub mod scenario;
pub mod settings;
pub mod state;
pub mod telemetry;
pub mod trainer;

pub use agent::{QLearningAgent, QLearningConfig};
pub use environment::{CurriculumEnvironment, EnvironmentConfig, StepMode, Transition};
pub use error::{AdvisorError, Result};
pub use graph::{CatalogGraph, Course, CourseGraph, CourseRecord, CourseType};
pub use policy::{PolicyConfig, Recommendation};
pub use predictor::GradePredictor;
pub use profile::{GraduationRequirements, Priorities, StudentProfile};
pub use qtable::QTable;
pub use reward::{RewardConfig, RewardModel, RewardScheme};
pub use settings::Settings;
pub use state::StateKey;
pub use trainer::{TrainingConfig, TrainingReport};
