//! Layered configuration: embedded defaults, an optional local file, then
//! `ADVISOR__SECTION__KEY` environment variables.

use crate::agent::QLearningConfig;
use crate::environment::EnvironmentConfig;
use crate::policy::PolicyConfig;
use crate::predictor::HistoricalGradePredictor;
use crate::reward::RewardConfig;
use crate::trainer::TrainingConfig;
use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    pub enable_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            enable_target: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PredictorKind {
    /// Blend of course history and the student's running GPA.
    #[default]
    Historical,
    /// Fitted linear model read from `model_path`.
    Linear,
    /// No predictor; grades fall back to the level heuristic.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub kind: PredictorKind,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Weights for the `historical` kind.
    #[serde(default)]
    pub historical: HistoricalGradePredictor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub q_table_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            q_table_path: PathBuf::from("artifacts/q_table.json"),
        }
    }
}

/// Main settings structure with all configuration sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
    pub reward: RewardConfig,
    pub agent: QLearningConfig,
    pub training: TrainingConfig,
    pub policy: PolicyConfig,
    pub predictor: PredictorConfig,
    pub persistence: PersistenceConfig,
}

impl Settings {
    /// Load settings from `advisor.toml` (if present) and the environment.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`Settings::load`], with an explicit file layered on top of the
    /// local one.
    pub fn load_with(extra: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::from_str(include_str!("../config.toml"), FileFormat::Toml))
            .add_source(File::with_name("advisor").required(false));

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("ADVISOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration sources")?;

        let settings: Settings = config
            .try_deserialize()
            .context("Failed to deserialize settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings for consistency
    pub fn validate(&self) -> Result<()> {
        self.environment.validate()?;
        self.reward.validate()?;
        self.agent.validate()?;
        self.training.validate()?;
        self.policy.validate()?;
        self.predictor.historical.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err(anyhow!("logging.level cannot be empty"));
        }

        match (self.predictor.kind, &self.predictor.model_path) {
            (PredictorKind::Linear, None) => {
                return Err(anyhow!("predictor.kind = \"linear\" requires predictor.model_path"));
            }
            (PredictorKind::Linear, Some(path)) if !path.exists() => {
                warn!("Grade model file does not exist: {:?}", path);
            }
            _ => {}
        }

        if self.policy.courses_per_semester > self.environment.semester_capacity {
            warn!(
                courses_per_semester = self.policy.courses_per_semester,
                semester_capacity = self.environment.semester_capacity,
                "Policy slots exceed semester capacity; plans will be truncated"
            );
        }

        Ok(())
    }
}
