//! Curriculum environment: the episode state machine.
//!
//! One environment owns one episode at a time. `reset` restores the
//! student's starting transcript; `step` consumes either a single course or
//! a whole semester plan, depending on [`StepMode`].

use crate::error::{AdvisorError, Result};
use crate::features::{estimate_grade, interest_match, CourseFeatures};
use crate::graph::{Course, CourseGraph, CourseType};
use crate::predictor::{clamp_grade, GradePredictor, PredictionFeatures};
use crate::profile::{Priorities, StudentProfile};
use crate::reward::RewardModel;
use crate::state::StateKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Action granularity accepted by [`CurriculumEnvironment::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Each step takes exactly one course.
    SingleCourse,
    /// Each step commits one semester plan.
    #[default]
    Semester,
}

/// A course that may not be taken before `min_semester`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapstoneRule {
    pub course: String,
    pub min_semester: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub step_mode: StepMode,
    /// Last semester index an episode may reach.
    pub max_semesters: u32,
    /// Courses that make up a semester in single-course mode.
    pub courses_per_semester: usize,
    /// Upper bound on the size of one semester plan.
    pub semester_capacity: usize,
    pub passing_grade: f64,
    /// Grade assumed for completed courses without a recorded grade.
    pub default_grade: f64,
    #[serde(default)]
    pub capstones: Vec<CapstoneRule>,
    /// Stop offering electives once the elective requirement is met.
    pub close_electives_when_met: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            step_mode: StepMode::default(),
            max_semesters: 8,
            courses_per_semester: 5,
            semester_capacity: 6,
            passing_grade: 1.0,
            default_grade: 3.0,
            capstones: Vec::new(),
            close_electives_when_met: true,
        }
    }
}

impl EnvironmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_semesters == 0 {
            return Err(AdvisorError::config("max_semesters must be at least 1"));
        }
        if self.courses_per_semester == 0 || self.semester_capacity == 0 {
            return Err(AdvisorError::config(
                "courses_per_semester and semester_capacity must be positive",
            ));
        }
        if !(0.0..=4.0).contains(&self.passing_grade) || !(0.0..=4.0).contains(&self.default_grade) {
            return Err(AdvisorError::config(
                "passing_grade and default_grade must lie on the 0-4 scale",
            ));
        }
        Ok(())
    }
}

/// Mutable progress of the current episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeState {
    pub completed: BTreeSet<String>,
    pub credits: u32,
    pub gpa: f64,
    pub grades: BTreeMap<String, f64>,
    pub semester: u32,
    pub courses_this_semester: usize,
    pub attempted: u32,
    pub failed: u32,
    /// Credits that carry a grade; the GPA weighting basis.
    graded_credits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    InProgress,
    Graduated,
    OutOfSemesters,
    NoValidActions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOutcome {
    pub course: String,
    pub grade: f64,
    pub passed: bool,
    pub reward: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub outcome: EpisodeOutcome,
    pub credits: u32,
    pub gpa: f64,
    /// Semester index after the step.
    pub semester: u32,
    pub semester_completed: bool,
    pub failed_courses: u32,
    pub courses: Vec<CourseOutcome>,
}

/// Result of one environment step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub next_state: StateKey,
    /// `course_reward + terminal_reward`.
    pub reward: f64,
    pub course_reward: f64,
    pub terminal_reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

pub struct CurriculumEnvironment {
    graph: Arc<dyn CourseGraph>,
    predictor: Option<Arc<dyn GradePredictor>>,
    profile: StudentProfile,
    priorities: Priorities,
    reward_model: RewardModel,
    config: EnvironmentConfig,
    state: EpisodeState,
}

impl CurriculumEnvironment {
    pub fn new(
        graph: Arc<dyn CourseGraph>,
        profile: StudentProfile,
        priorities: Priorities,
        reward_model: RewardModel,
        config: EnvironmentConfig,
    ) -> Result<Self> {
        profile.validate()?;
        priorities.validate()?;
        config.validate()?;
        reward_model.terminal().validate()?;

        for course in &profile.completed_courses {
            if graph.course(course).is_none() {
                warn!(course = %course, "Completed course is not in the prerequisite graph");
            }
        }

        let state = initial_state(graph.as_ref(), &profile, &config);
        Ok(Self {
            graph,
            predictor: None,
            profile,
            priorities,
            reward_model,
            config,
            state,
        })
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn GradePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Restore the student's starting transcript and return its state key.
    pub fn reset(&mut self) -> StateKey {
        self.state = initial_state(self.graph.as_ref(), &self.profile, &self.config);
        self.state_key()
    }

    pub fn state_key(&self) -> StateKey {
        StateKey::new(
            self.state.completed.iter().map(String::as_str),
            self.state.semester,
            self.state.gpa,
        )
    }

    /// Courses that may be taken now, in the graph's stable order.
    pub fn valid_actions(&self) -> Vec<String> {
        let electives_closed = self.config.close_electives_when_met
            && self.count_completed(CourseType::Elective)
                >= self.profile.graduation_requirements.electives;

        self.graph
            .course_ids()
            .into_iter()
            .filter(|id| !self.state.completed.contains(*id))
            .filter(|id| {
                self.graph
                    .prerequisites(id)
                    .iter()
                    .all(|prerequisite| self.state.completed.contains(*prerequisite))
            })
            .filter_map(|id| self.graph.course(id))
            .filter(|course| self.track_eligible(course))
            .filter(|course| self.capstone_open(&course.id))
            .filter(|course| !(electives_closed && course.course_type == CourseType::Elective))
            .map(|course| course.id.clone())
            .collect()
    }

    /// Static attributes merged with student-dependent features.
    pub fn course_features(&self, course_id: &str) -> Result<CourseFeatures> {
        let course = self.course(course_id)?;
        let mut features = CourseFeatures::from_course(course, self.graph.out_degree(course_id));
        features.interest_match = interest_match(
            &self.profile.interests,
            &course.category,
            course.track.as_deref(),
        );

        match &self.predictor {
            Some(predictor) => {
                let grade = self.predict(predictor.as_ref(), course)?;
                features.predicted_grade = Some(grade);
                features.expected_grade = grade;
            }
            None => {
                features.expected_grade = estimate_grade(self.state.gpa, course.level);
            }
        }
        Ok(features)
    }

    /// Reward for taking `course_id` now, without changing any state.
    pub fn course_reward(&self, course_id: &str) -> Result<f64> {
        let features = self.course_features(course_id)?;
        Ok(self.score(&features))
    }

    pub fn step_course(&mut self, course_id: &str) -> Result<Transition> {
        self.step(&[course_id.to_string()])
    }

    /// Take `courses`: one course in single-course mode, one semester plan
    /// in semester mode.
    pub fn step(&mut self, courses: &[String]) -> Result<Transition> {
        self.check_arity(courses)?;

        // A step either commits every course or leaves the episode untouched.
        let snapshot = self.state.clone();
        let (course_reward, outcomes) = match self.take_courses(courses) {
            Ok(taken) => taken,
            Err(e) => {
                self.state = snapshot;
                return Err(e);
            }
        };

        self.state.courses_this_semester += courses.len();
        let semester_completed = match self.config.step_mode {
            StepMode::Semester => true,
            StepMode::SingleCourse => self.state.courses_this_semester >= self.config.courses_per_semester,
        };

        let graduated = self.is_graduated();
        let semesters_used = self.semesters_used();
        if semester_completed {
            self.state.semester += 1;
            self.state.courses_this_semester = 0;
        }

        let terminal = self.reward_model.terminal();
        let (outcome, terminal_reward) = if graduated {
            (EpisodeOutcome::Graduated, terminal.graduation(semesters_used))
        } else if self.state.semester > self.config.max_semesters {
            (EpisodeOutcome::OutOfSemesters, terminal.failure())
        } else if self.valid_actions().is_empty() {
            (EpisodeOutcome::NoValidActions, terminal.failure())
        } else {
            (EpisodeOutcome::InProgress, 0.0)
        };
        let done = outcome != EpisodeOutcome::InProgress;

        if done {
            debug!(
                ?outcome,
                credits = self.state.credits,
                gpa = self.state.gpa,
                semester = self.state.semester,
                "Episode finished"
            );
        }

        Ok(Transition {
            next_state: self.state_key(),
            reward: course_reward + terminal_reward,
            course_reward,
            terminal_reward,
            done,
            info: StepInfo {
                outcome,
                credits: self.state.credits,
                gpa: self.state.gpa,
                semester: self.state.semester,
                semester_completed,
                failed_courses: self.state.failed,
                courses: outcomes,
            },
        })
    }

    fn take_courses(&mut self, courses: &[String]) -> Result<(f64, Vec<CourseOutcome>)> {
        let mut course_reward = 0.0;
        let mut outcomes = Vec::with_capacity(courses.len());
        for course_id in courses {
            if self.state.completed.contains(course_id) {
                return Err(AdvisorError::InvalidAction(format!(
                    "course '{}' is already completed",
                    course_id
                )));
            }
            let features = self.course_features(course_id)?;
            let reward = self.score(&features);
            let grade = features.expected_grade;
            self.record_grade(course_id, features.credits, grade);

            course_reward += reward;
            outcomes.push(CourseOutcome {
                course: course_id.clone(),
                grade,
                passed: grade >= self.config.passing_grade,
                reward,
            });
        }
        Ok((course_reward, outcomes))
    }

    /// All graduation requirements hold for the current episode state.
    pub fn is_graduated(&self) -> bool {
        let requirements = &self.profile.graduation_requirements;
        self.state.credits >= requirements.total_credits
            && self.count_completed(CourseType::Core) >= requirements.core_courses
            && self.count_completed(CourseType::Elective) >= requirements.electives
            && self.priorities.min_gpa.map_or(true, |min| self.state.gpa >= min)
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn semester(&self) -> u32 {
        self.state.semester
    }

    pub fn gpa(&self) -> f64 {
        self.state.gpa
    }

    pub fn credits(&self) -> u32 {
        self.state.credits
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn step_mode(&self) -> StepMode {
        self.config.step_mode
    }

    pub fn graph(&self) -> &dyn CourseGraph {
        self.graph.as_ref()
    }

    pub fn reward_model(&self) -> &RewardModel {
        &self.reward_model
    }

    pub fn course(&self, course_id: &str) -> Result<&Course> {
        self.graph
            .course(course_id)
            .ok_or_else(|| AdvisorError::UnknownCourse(course_id.to_string()))
    }

    fn score(&self, features: &CourseFeatures) -> f64 {
        self.reward_model.reward(
            features,
            &self.profile,
            &self.priorities,
            self.state.gpa,
            self.state.semester,
        )
    }

    fn check_arity(&self, courses: &[String]) -> Result<()> {
        match self.config.step_mode {
            StepMode::SingleCourse if courses.len() != 1 => Err(AdvisorError::InvalidAction(format!(
                "single-course mode takes exactly one course, got {}",
                courses.len()
            ))),
            StepMode::Semester if courses.is_empty() => {
                Err(AdvisorError::InvalidAction("semester plan is empty".to_string()))
            }
            StepMode::Semester if courses.len() > self.config.semester_capacity => {
                Err(AdvisorError::InvalidAction(format!(
                    "semester plan of {} courses exceeds capacity {}",
                    courses.len(),
                    self.config.semester_capacity
                )))
            }
            _ => Ok(()),
        }
    }

    fn predict(&self, predictor: &dyn GradePredictor, course: &Course) -> Result<f64> {
        let features = PredictionFeatures {
            credits: f64::from(course.credits),
            fail_rate: course.fail_rate,
            average_grade: course.average_grade,
            student_gpa: self.state.gpa,
            student_fail_rate: self.student_fail_rate(),
            course_code: course.code,
        };
        let grade = predictor
            .predict(&features)
            .map_err(|e| AdvisorError::Prediction {
                course: course.id.clone(),
                message: format!("{:#}", e),
            })?;
        if !grade.is_finite() {
            return Err(AdvisorError::Prediction {
                course: course.id.clone(),
                message: format!("non-finite grade {}", grade),
            });
        }
        Ok(clamp_grade(grade))
    }

    fn student_fail_rate(&self) -> f64 {
        if self.state.attempted > 0 {
            f64::from(self.state.failed) / f64::from(self.state.attempted)
        } else {
            self.profile.fail_rate.unwrap_or(0.0)
        }
    }

    fn record_grade(&mut self, course_id: &str, credits: u32, grade: f64) {
        let state = &mut self.state;
        let weighted_total = state.graded_credits + credits;
        state.gpa = (state.gpa * f64::from(state.graded_credits) + grade * f64::from(credits))
            / f64::from(weighted_total);
        state.graded_credits = weighted_total;
        state.credits += credits;
        state.attempted += 1;
        if grade < self.config.passing_grade {
            state.failed += 1;
        }
        state.grades.insert(course_id.to_string(), grade);
        state.completed.insert(course_id.to_string());
    }

    fn count_completed(&self, course_type: CourseType) -> u32 {
        self.state
            .completed
            .iter()
            .filter_map(|id| self.graph.course(id))
            .filter(|course| course.course_type == course_type)
            .count() as u32
    }

    fn semesters_used(&self) -> u32 {
        self.state.semester.saturating_sub(self.profile.current_semester) + 1
    }

    fn track_eligible(&self, course: &Course) -> bool {
        self.priorities.preferred_tracks.is_empty()
            || course.track.is_none()
            || course.compulsory
            || self.priorities.prefers_track(course.track.as_deref())
    }

    fn capstone_open(&self, course_id: &str) -> bool {
        self.config
            .capstones
            .iter()
            .find(|rule| rule.course == course_id)
            .map_or(true, |rule| self.state.semester >= rule.min_semester)
    }
}

fn initial_state(
    graph: &dyn CourseGraph,
    profile: &StudentProfile,
    config: &EnvironmentConfig,
) -> EpisodeState {
    let mut credits = 0;
    let mut weighted_points = 0.0;
    let mut grades = BTreeMap::new();

    for course_id in &profile.completed_courses {
        let Some(course) = graph.course(course_id) else {
            continue;
        };
        let grade = profile
            .grades
            .get(course_id)
            .copied()
            .unwrap_or(config.default_grade);
        credits += course.credits;
        weighted_points += grade * f64::from(course.credits);
        grades.insert(course_id.clone(), grade);
    }

    let gpa = if credits > 0 {
        weighted_points / f64::from(credits)
    } else {
        profile.current_gpa
    };

    EpisodeState {
        completed: profile.completed_courses.clone(),
        credits,
        gpa,
        grades,
        semester: profile.current_semester,
        courses_this_semester: 0,
        attempted: 0,
        failed: 0,
        graded_credits: credits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CatalogGraph, CourseRecord};
    use crate::profile::GraduationRequirements;
    use crate::reward::RewardConfig;

    fn s(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn diamond_graph() -> Arc<dyn CourseGraph> {
        Arc::new(
            CatalogGraph::from_records(vec![
                CourseRecord::new("A", 3, CourseType::Core),
                CourseRecord::new("B", 3, CourseType::Core).requires(["A"]),
                CourseRecord::new("C", 3, CourseType::Core).requires(["A"]),
                CourseRecord::new("D", 3, CourseType::Core).requires(["B", "C"]),
            ])
            .unwrap(),
        )
    }

    fn requirements(total_credits: u32, core_courses: u32, electives: u32) -> GraduationRequirements {
        GraduationRequirements {
            total_credits,
            core_courses,
            electives,
        }
    }

    fn env_with(
        graph: Arc<dyn CourseGraph>,
        profile: StudentProfile,
        priorities: Priorities,
        config: EnvironmentConfig,
    ) -> CurriculumEnvironment {
        CurriculumEnvironment::new(
            graph,
            profile,
            priorities,
            RewardModel::new(&RewardConfig::default()),
            config,
        )
        .unwrap()
    }

    fn diamond_env(req: GraduationRequirements) -> CurriculumEnvironment {
        env_with(
            diamond_graph(),
            StudentProfile::new(3.0, req),
            Priorities::default(),
            EnvironmentConfig::default(),
        )
    }

    #[test]
    fn test_diamond_walkthrough() {
        let mut env = diamond_env(requirements(12, 4, 0));
        env.reset();
        assert_eq!(env.valid_actions(), s(&["A"]));

        let t = env.step(&s(&["A"])).unwrap();
        assert!(!t.done);
        assert_eq!(env.valid_actions(), s(&["B", "C"]));

        let t = env.step(&s(&["B", "C"])).unwrap();
        assert!(!t.done);
        assert_eq!(env.valid_actions(), s(&["D"]));

        let t = env.step(&s(&["D"])).unwrap();
        assert!(t.done);
        assert_eq!(t.info.outcome, EpisodeOutcome::Graduated);
        assert_eq!(t.info.credits, 12);
        assert!(env.is_graduated());
        assert!(t.terminal_reward > 0.0);
    }

    #[test]
    fn test_graduates_as_soon_as_requirements_hold() {
        let mut env = diamond_env(requirements(6, 2, 0));
        env.reset();
        env.step(&s(&["A"])).unwrap();
        let t = env.step(&s(&["B", "C"])).unwrap();
        assert!(t.done);
        assert_eq!(t.info.outcome, EpisodeOutcome::Graduated);
        // Two semesters consumed from semester 1.
        assert_eq!(t.terminal_reward, 200.0 - 10.0 * 2.0);
    }

    #[test]
    fn test_reset_is_idempotent_and_restores_snapshot() {
        let mut env = diamond_env(requirements(12, 4, 0));
        let first = env.reset();
        env.step(&s(&["A"])).unwrap();
        assert_ne!(env.state_key(), first);

        let second = env.reset();
        let third = env.reset();
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(env.credits(), 0);
        assert_eq!(env.semester(), 1);
        assert_eq!(env.state().attempted, 0);
    }

    #[test]
    fn test_reset_recomputes_gpa_from_prior_grades() {
        let mut profile = StudentProfile::new(3.9, requirements(12, 4, 0)).with_completed(["A", "B"]);
        profile.grades.insert("A".to_string(), 4.0);
        profile.current_semester = 3;
        let mut env = env_with(
            diamond_graph(),
            profile,
            Priorities::default(),
            EnvironmentConfig::default(),
        );

        env.reset();
        // A graded 4.0, B ungraded -> default 3.0, equal credits.
        assert!((env.gpa() - 3.5).abs() < 1e-9);
        assert_eq!(env.credits(), 6);
        assert_eq!(env.semester(), 3);
        assert_eq!(env.valid_actions(), s(&["C"]));
    }

    #[test]
    fn test_gpa_is_credit_weighted() {
        let graph: Arc<dyn CourseGraph> = Arc::new(
            CatalogGraph::from_records(vec![
                CourseRecord::new("HEAVY", 6, CourseType::Core),
                CourseRecord::new("LIGHT", 2, CourseType::Core),
            ])
            .unwrap(),
        );
        let grades = |features: &PredictionFeatures| -> anyhow::Result<f64> {
            Ok(if features.credits > 3.0 { 4.0 } else { 2.0 })
        };
        let mut env = env_with(
            graph,
            StudentProfile::new(3.0, requirements(100, 2, 0)),
            Priorities::default(),
            EnvironmentConfig::default(),
        )
        .with_predictor(Arc::new(grades));
        env.reset();

        env.step(&s(&["HEAVY", "LIGHT"])).unwrap();
        assert!((env.gpa() - (4.0 * 6.0 + 2.0 * 2.0) / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_track_filter_keeps_untracked_and_compulsory() {
        let graph: Arc<dyn CourseGraph> = Arc::new(
            CatalogGraph::from_records(vec![
                CourseRecord::new("BD1", 3, CourseType::Elective).with_track("Big_Data"),
                CourseRecord::new("MI1", 3, CourseType::Elective).with_track("Media_Informatics"),
                CourseRecord::new("MI2", 3, CourseType::Core)
                    .with_track("Media_Informatics")
                    .compulsory(),
                CourseRecord::new("GEN", 3, CourseType::General),
            ])
            .unwrap(),
        );
        let priorities = Priorities {
            preferred_tracks: vec!["Big_Data".to_string()],
            ..Priorities::default()
        };
        let env = env_with(
            graph,
            StudentProfile::new(3.0, requirements(30, 1, 2)),
            priorities,
            EnvironmentConfig::default(),
        );

        assert_eq!(env.valid_actions(), s(&["BD1", "GEN", "MI2"]));
    }

    #[test]
    fn test_capstone_and_elective_filters() {
        let graph: Arc<dyn CourseGraph> = Arc::new(
            CatalogGraph::from_records(vec![
                CourseRecord::new("CORE1", 3, CourseType::Core),
                CourseRecord::new("ELEC1", 3, CourseType::Elective),
                CourseRecord::new("ELEC2", 3, CourseType::Elective),
                CourseRecord::new("PROJ", 3, CourseType::Core),
            ])
            .unwrap(),
        );
        let config = EnvironmentConfig {
            capstones: vec![CapstoneRule {
                course: "PROJ".to_string(),
                min_semester: 2,
            }],
            ..EnvironmentConfig::default()
        };
        let mut env = env_with(
            graph,
            StudentProfile::new(3.0, requirements(30, 2, 1)),
            Priorities::default(),
            config,
        );
        env.reset();
        assert_eq!(env.valid_actions(), s(&["CORE1", "ELEC1", "ELEC2"]));

        env.step(&s(&["ELEC1"])).unwrap();
        // Semester 2 opens the capstone; the single elective slot is filled.
        assert_eq!(env.valid_actions(), s(&["CORE1", "PROJ"]));
    }

    #[test]
    fn test_single_course_mode_advances_semester_after_quota() {
        let config = EnvironmentConfig {
            step_mode: StepMode::SingleCourse,
            courses_per_semester: 2,
            ..EnvironmentConfig::default()
        };
        let mut env = env_with(
            diamond_graph(),
            StudentProfile::new(3.0, requirements(12, 4, 0)),
            Priorities::default(),
            config,
        );
        env.reset();

        let t = env.step_course("A").unwrap();
        assert!(!t.info.semester_completed);
        assert_eq!(t.info.semester, 1);
        let t = env.step_course("B").unwrap();
        assert!(t.info.semester_completed);
        assert_eq!(t.info.semester, 2);

        assert!(matches!(
            env.step(&s(&["C", "D"])),
            Err(AdvisorError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_running_out_of_semesters_is_penalised() {
        let config = EnvironmentConfig {
            max_semesters: 2,
            ..EnvironmentConfig::default()
        };
        let mut env = env_with(
            diamond_graph(),
            StudentProfile::new(3.0, requirements(12, 4, 0)),
            Priorities::default(),
            config,
        );
        env.reset();
        env.step(&s(&["A"])).unwrap();
        let t = env.step(&s(&["B"])).unwrap();

        assert!(t.done);
        assert_eq!(t.info.outcome, EpisodeOutcome::OutOfSemesters);
        assert_eq!(t.terminal_reward, -300.0);
        assert!(t.reward < 0.0);
    }

    #[test]
    fn test_exhausted_actions_end_the_episode() {
        let mut env = diamond_env(requirements(100, 4, 0));
        env.reset();
        env.step(&s(&["A"])).unwrap();
        env.step(&s(&["B", "C"])).unwrap();
        let t = env.step(&s(&["D"])).unwrap();

        assert!(t.done);
        assert_eq!(t.info.outcome, EpisodeOutcome::NoValidActions);
        assert!(env.valid_actions().is_empty());
    }

    #[test]
    fn test_predictor_failure_propagates() {
        let failing = |_: &PredictionFeatures| -> anyhow::Result<f64> { Err(anyhow::anyhow!("model offline")) };
        let mut env = diamond_env(requirements(12, 4, 0)).with_predictor(Arc::new(failing));
        env.reset();

        let err = env.step(&s(&["A"])).unwrap_err();
        match err {
            AdvisorError::Prediction { course, message } => {
                assert_eq!(course, "A");
                assert!(message.contains("model offline"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_plan_leaves_state_untouched() {
        // Succeeds for the first course, fails once the GPA has moved.
        let flaky = |features: &PredictionFeatures| -> anyhow::Result<f64> {
            if features.student_gpa < 3.0 {
                Err(anyhow::anyhow!("model drifted"))
            } else {
                Ok(2.0)
            }
        };
        let mut env = diamond_env(requirements(12, 4, 0)).with_predictor(Arc::new(flaky));
        env.reset();
        let before = env.state().clone();

        let err = env.step(&s(&["A", "B"])).unwrap_err();
        assert!(matches!(err, AdvisorError::Prediction { ref course, .. } if course == "B"));
        assert_eq!(env.state(), &before);
        assert!(env.state().completed.is_empty());
        assert_eq!(env.credits(), 0);
        assert_eq!(env.gpa(), 3.0);
    }

    #[test]
    fn test_repeated_course_in_plan_is_rejected_atomically() {
        let mut env = diamond_env(requirements(12, 4, 0));
        env.reset();
        let before = env.state().clone();

        assert!(matches!(
            env.step(&s(&["A", "A"])),
            Err(AdvisorError::InvalidAction(_))
        ));
        assert_eq!(env.state(), &before);
        assert_eq!(env.valid_actions(), s(&["A"]));
    }

    #[test]
    fn test_failing_grades_are_counted() {
        let harsh = |_: &PredictionFeatures| -> anyhow::Result<f64> { Ok(0.5) };
        let mut env = diamond_env(requirements(12, 4, 0)).with_predictor(Arc::new(harsh));
        env.reset();

        let t = env.step(&s(&["A"])).unwrap();
        assert_eq!(t.info.failed_courses, 1);
        assert!(!t.info.courses[0].passed);
        assert!(env.state().completed.contains("A"));
    }

    #[test]
    fn test_features_include_derived_fields() {
        let mut env = diamond_env(requirements(12, 4, 0));
        env.reset();
        let features = env.course_features("A").unwrap();
        assert_eq!(features.out_degree, 2);
        assert_eq!(features.predicted_grade, None);
        assert_eq!(features.expected_grade, 3.0);

        assert!(matches!(
            env.course_features("NOPE"),
            Err(AdvisorError::UnknownCourse(_))
        ));
    }

    #[test]
    fn test_min_gpa_blocks_graduation() {
        let low = |_: &PredictionFeatures| -> anyhow::Result<f64> { Ok(1.5) };
        let priorities = Priorities {
            min_gpa: Some(2.0),
            ..Priorities::default()
        };
        let mut env = env_with(
            diamond_graph(),
            StudentProfile::new(3.0, requirements(3, 1, 0)),
            priorities,
            EnvironmentConfig::default(),
        )
        .with_predictor(Arc::new(low));
        env.reset();

        let t = env.step(&s(&["A"])).unwrap();
        assert!(!env.is_graduated());
        assert_ne!(t.info.outcome, EpisodeOutcome::Graduated);
    }
}
