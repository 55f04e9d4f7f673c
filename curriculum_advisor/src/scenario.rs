//! Train, recommend and inspect jobs driven from catalog and student files.
//!
//! These are the functions behind the CLI subcommands: they load inputs,
//! wire the environment and agent from [`Settings`], and return
//! serialisable summaries.

use crate::agent::{QLearningAgent, QLearningConfig};
use crate::environment::CurriculumEnvironment;
use crate::graph::{CatalogGraph, CourseGraph};
use crate::policy::{self, Recommendation};
use crate::predictor::{GradePredictor, LinearGradePredictor};
use crate::profile::{Priorities, StudentProfile};
use crate::qtable::QTable;
use crate::reward::RewardModel;
use crate::settings::{PredictorConfig, PredictorKind, Settings};
use crate::trainer::{self, TrainingReport};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// A student and what they want out of their plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub student: StudentProfile,
    #[serde(default)]
    pub priorities: Priorities,
}

impl Scenario {
    /// Read a scenario from a `.json` or `.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read student scenario: {:?}", path))?;
        let scenario: Scenario = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse student scenario: {:?}", path))?,
            _ => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse student scenario: {:?}", path))?,
        };
        Ok(scenario)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub q_table_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub courses: usize,
    pub prerequisites: usize,
    /// Courses without prerequisites.
    pub entry_points: Vec<String>,
    pub max_level: u32,
    pub total_credits: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QTableSummary {
    pub states: usize,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub catalog: CatalogSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_table: Option<QTableSummary>,
}

pub fn build_predictor(config: &PredictorConfig) -> Result<Option<Arc<dyn GradePredictor>>> {
    let predictor: Option<Arc<dyn GradePredictor>> = match config.kind {
        PredictorKind::None => None,
        PredictorKind::Historical => Some(Arc::new(config.historical.clone())),
        PredictorKind::Linear => {
            let path = config
                .model_path
                .as_deref()
                .ok_or_else(|| anyhow!("Linear predictor requires predictor.model_path"))?;
            Some(Arc::new(LinearGradePredictor::load(path)?))
        }
    };
    Ok(predictor)
}

pub fn build_environment(
    graph: Arc<dyn CourseGraph>,
    scenario: &Scenario,
    settings: &Settings,
) -> Result<CurriculumEnvironment> {
    let env = CurriculumEnvironment::new(
        graph,
        scenario.student.clone(),
        scenario.priorities.clone(),
        RewardModel::new(&settings.reward),
        settings.environment.clone(),
    )
    .context("Failed to build curriculum environment")?;

    Ok(match build_predictor(&settings.predictor)? {
        Some(predictor) => env.with_predictor(predictor),
        None => env,
    })
}

fn load_catalog(path: &Path) -> Result<Arc<dyn CourseGraph>> {
    let graph = CatalogGraph::load(path).with_context(|| format!("Failed to load course catalog: {:?}", path))?;
    Ok(Arc::new(graph))
}

/// Train a fresh agent and persist its table.
#[instrument(skip(settings))]
pub fn run_training(
    catalog: &Path,
    student: &Path,
    settings: &Settings,
    episodes: Option<usize>,
    output: Option<&Path>,
) -> Result<TrainingOutcome> {
    let graph = load_catalog(catalog)?;
    let scenario = Scenario::load(student)?;
    let mut env = build_environment(graph, &scenario, settings)?;
    let mut agent = QLearningAgent::new(settings.agent.clone()).context("Invalid agent configuration")?;

    let mut training = settings.training.clone();
    if let Some(episodes) = episodes {
        training.episodes = episodes;
    }

    let report = trainer::train(&mut env, &mut agent, &training).context("Training failed")?;

    let q_table_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.persistence.q_table_path.clone());
    agent
        .save(&q_table_path)
        .with_context(|| format!("Failed to save Q-table: {:?}", q_table_path))?;

    info!(
        episodes = report.episodes,
        graduated = report.graduated,
        path = ?q_table_path,
        "Training job complete"
    );
    Ok(TrainingOutcome { report, q_table_path })
}

/// Replay a saved table for the scenario's student.
#[instrument(skip(settings))]
pub fn run_recommendation(
    catalog: &Path,
    student: &Path,
    q_table: Option<&Path>,
    settings: &Settings,
) -> Result<Recommendation> {
    let graph = load_catalog(catalog)?;
    let scenario = Scenario::load(student)?;
    let mut env = build_environment(graph, &scenario, settings)?;

    let path = q_table.unwrap_or(settings.persistence.q_table_path.as_path());
    let table = QTable::load(path).with_context(|| format!("Failed to load Q-table: {:?}", path))?;
    let greedy = QLearningConfig {
        epsilon: 0.0,
        min_epsilon: 0.0,
        ..settings.agent.clone()
    };
    let mut agent = QLearningAgent::with_table(greedy, table)?;

    policy::recommend(&mut env, &mut agent, &settings.policy).context("Policy replay failed")
}

pub fn inspect(catalog: &Path, q_table: Option<&Path>) -> Result<InspectReport> {
    let graph = CatalogGraph::load(catalog).with_context(|| format!("Failed to load course catalog: {:?}", catalog))?;
    let ids = graph.course_ids();

    let courses: Vec<_> = ids.iter().filter_map(|id| graph.course(id)).collect();
    let summary = CatalogSummary {
        courses: courses.len(),
        prerequisites: ids.iter().map(|id| graph.prerequisites(id).len()).sum(),
        entry_points: ids
            .iter()
            .filter(|id| graph.prerequisites(id).is_empty())
            .map(|id| id.to_string())
            .collect(),
        max_level: courses.iter().map(|course| course.level).max().unwrap_or(0),
        total_credits: courses.iter().map(|course| course.credits).sum(),
    };

    let q_table = match q_table {
        Some(path) => {
            let table = QTable::load(path).with_context(|| format!("Failed to load Q-table: {:?}", path))?;
            Some(QTableSummary {
                states: table.state_count(),
                entries: table.entry_count(),
            })
        }
        None => None,
    };

    Ok(InspectReport {
        catalog: summary,
        q_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{HistoricalGradePredictor, PredictionFeatures};
    use std::fs;
    use tempfile::tempdir;

    const CATALOG: &str = r#"
[[courses]]
id = "CS101"
credits = 3
type = "core"
category = "Computer Science"

[[courses]]
id = "CS201"
credits = 3
type = "core"
category = "Computer Science"
prerequisites = ["CS101"]
"#;

    const STUDENT: &str = r#"
[student]
current_gpa = 3.2
interests = ["Computer Science"]

[student.graduation_requirements]
total_credits = 6
core_courses = 2
electives = 0

[priorities]
focus = "speed"
"#;

    #[test]
    fn test_scenario_loads_toml_with_default_priorities() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("student.toml");
        fs::write(&path, STUDENT).unwrap();
        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.student.current_semester, 1);
        assert_eq!(scenario.priorities.focus, crate::profile::FocusMode::Speed);
        assert!(scenario.priorities.preferred_tracks.is_empty());
    }

    #[test]
    fn test_inspect_summarises_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        fs::write(&path, CATALOG).unwrap();

        let report = inspect(&path, None).unwrap();
        assert_eq!(report.catalog.courses, 2);
        assert_eq!(report.catalog.prerequisites, 1);
        assert_eq!(report.catalog.entry_points, vec!["CS101"]);
        assert_eq!(report.catalog.max_level, 2);
        assert!(report.q_table.is_none());
    }

    #[test]
    fn test_linear_predictor_needs_a_model() {
        let config = PredictorConfig {
            kind: PredictorKind::Linear,
            ..PredictorConfig::default()
        };
        assert!(build_predictor(&config).is_err());
        assert!(build_predictor(&PredictorConfig::default()).unwrap().is_some());
    }

    #[test]
    fn test_historical_predictor_uses_configured_weights() {
        let features = PredictionFeatures {
            credits: 3.0,
            fail_rate: 0.0,
            average_grade: 4.0,
            student_gpa: 2.0,
            student_fail_rate: 0.0,
            course_code: 0,
        };
        let config = PredictorConfig {
            historical: HistoricalGradePredictor {
                course_weight: 1.0,
                student_weight: 0.0,
                ..HistoricalGradePredictor::default()
            },
            ..PredictorConfig::default()
        };
        let predictor = build_predictor(&config).unwrap().unwrap();
        assert_eq!(predictor.predict(&features).unwrap(), 4.0);

        let blended = build_predictor(&PredictorConfig::default()).unwrap().unwrap();
        assert_eq!(blended.predict(&features).unwrap(), 3.0);
    }

    #[test]
    fn test_missing_catalog_reports_path() {
        let err = inspect(Path::new("/nonexistent/catalog.json"), None).unwrap_err();
        assert!(format!("{:#}", err).contains("catalog.json"));
    }
}
