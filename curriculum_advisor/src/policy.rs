//! Greedy replay of a learned table into a semester-by-semester plan.

use crate::agent::QLearningAgent;
use crate::environment::{CurriculumEnvironment, EpisodeOutcome, StepMode, Transition};
use crate::error::{AdvisorError, Result};
use crate::graph::Course;
use crate::state::StateKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Minimum and maximum number of courses from one category in a semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryQuota {
    pub category: String,
    #[serde(default)]
    pub min: usize,
    #[serde(default)]
    pub max: Option<usize>,
    /// Explicit members; when empty, courses match on their category.
    #[serde(default)]
    pub courses: Vec<String>,
}

impl CategoryQuota {
    pub fn new(category: impl Into<String>, min: usize, max: Option<usize>) -> Self {
        Self {
            category: category.into(),
            min,
            max,
            courses: Vec::new(),
        }
    }

    pub fn with_courses<I, S>(mut self, courses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.courses = courses.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, course: &Course) -> bool {
        if self.courses.is_empty() {
            course.category.eq_ignore_ascii_case(&self.category)
        } else {
            self.courses.iter().any(|id| id == &course.id)
        }
    }
}

/// Quotas that replace the defaults in the listed semesters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterOverride {
    pub semesters: Vec<u32>,
    pub quotas: Vec<CategoryQuota>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemesterTemplate {
    #[serde(default)]
    pub quotas: Vec<CategoryQuota>,
    #[serde(default)]
    pub overrides: Vec<SemesterOverride>,
}

impl SemesterTemplate {
    /// Default quotas, extended or replaced by any override for `semester`.
    pub fn quotas_for(&self, semester: u32) -> Vec<CategoryQuota> {
        let mut quotas = self.quotas.clone();
        for extra in self
            .overrides
            .iter()
            .filter(|o| o.semesters.contains(&semester))
            .flat_map(|o| o.quotas.iter())
        {
            match quotas.iter_mut().find(|q| q.category == extra.category) {
                Some(existing) => *existing = extra.clone(),
                None => quotas.push(extra.clone()),
            }
        }
        quotas
    }

    pub fn validate(&self) -> Result<()> {
        let all = self
            .quotas
            .iter()
            .chain(self.overrides.iter().flat_map(|o| o.quotas.iter()));
        for quota in all {
            if let Some(max) = quota.max {
                if quota.min > max {
                    return Err(AdvisorError::config(format!(
                        "quota '{}' has min {} above max {}",
                        quota.category, quota.min, max
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Regular slots per semester.
    pub courses_per_semester: usize,
    /// Allow one course beyond the regular slots.
    #[serde(default)]
    pub overload_slot: bool,
    /// Hard cap on emitted courses; derived from the environment when unset.
    #[serde(default)]
    pub max_courses: Option<usize>,
    #[serde(default)]
    pub template: SemesterTemplate,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            courses_per_semester: 5,
            overload_slot: false,
            max_courses: None,
            template: SemesterTemplate::default(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.courses_per_semester == 0 {
            return Err(AdvisorError::config("policy.courses_per_semester must be positive"));
        }
        if self.max_courses == Some(0) {
            return Err(AdvisorError::config("policy.max_courses must be positive"));
        }
        self.template.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterPlan {
    pub semester: u32,
    pub courses: Vec<String>,
    pub credits: u32,
    pub gpa_after: f64,
    pub total_credits_after: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub semesters: Vec<SemesterPlan>,
    pub graduated: bool,
    pub outcome: EpisodeOutcome,
    pub final_gpa: f64,
    pub total_credits: u32,
}

impl Recommendation {
    pub fn course_count(&self) -> usize {
        self.semesters.iter().map(|s| s.courses.len()).sum()
    }
}

/// Replay the agent greedily from the student's starting state.
///
/// Exploration is switched off for the replay and the agent's previous ε
/// is restored afterwards, whether or not the replay succeeds.
#[instrument(skip(env, agent, config), fields(mode = ?env.step_mode()))]
pub fn recommend(
    env: &mut CurriculumEnvironment,
    agent: &mut QLearningAgent,
    config: &PolicyConfig,
) -> Result<Recommendation> {
    config.validate()?;
    let saved_epsilon = agent.epsilon();
    agent.set_epsilon(0.0);

    let result = match env.step_mode() {
        StepMode::SingleCourse => replay_single_course(env, agent, config),
        StepMode::Semester => replay_semesters(env, agent, config),
    };
    agent.set_epsilon(saved_epsilon);

    let recommendation = result?;
    info!(
        semesters = recommendation.semesters.len(),
        courses = recommendation.course_count(),
        graduated = recommendation.graduated,
        final_gpa = recommendation.final_gpa,
        "Recommendation ready"
    );
    Ok(recommendation)
}

fn course_cap(env: &CurriculumEnvironment, config: &PolicyConfig) -> usize {
    config.max_courses.unwrap_or_else(|| {
        let semesters = env.config().max_semesters as usize;
        (semesters * env.config().semester_capacity).max(1)
    })
}

fn replay_semesters(
    env: &mut CurriculumEnvironment,
    agent: &mut QLearningAgent,
    config: &PolicyConfig,
) -> Result<Recommendation> {
    let cap = course_cap(env, config);
    let mut base = env.reset();
    let mut semesters = Vec::new();
    let mut emitted = 0;
    let mut outcome = EpisodeOutcome::InProgress;

    while emitted < cap {
        let semester = env.semester();
        let plan = pick_semester_plan(env, agent, config, &base, cap - emitted)?;
        if plan.is_empty() {
            warn!(semester, "No course could be recommended for the semester");
            outcome = EpisodeOutcome::NoValidActions;
            break;
        }

        let credits = plan_credits(env, &plan)?;
        emitted += plan.len();
        let transition = env.step(&plan)?;
        debug!(semester, courses = ?plan, credits, "Semester planned");
        semesters.push(SemesterPlan {
            semester,
            courses: plan,
            credits,
            gpa_after: transition.info.gpa,
            total_credits_after: transition.info.credits,
        });

        outcome = transition.info.outcome;
        if transition.done {
            break;
        }
        base = transition.next_state;
    }

    Ok(finish(env, semesters, outcome))
}

/// Category minimums first, then greedy fill up to the slot limit.
fn pick_semester_plan(
    env: &CurriculumEnvironment,
    agent: &mut QLearningAgent,
    config: &PolicyConfig,
    base: &StateKey,
    remaining_cap: usize,
) -> Result<Vec<String>> {
    let quotas = config.template.quotas_for(env.semester());
    let regular = config
        .courses_per_semester
        .min(env.config().semester_capacity)
        .min(remaining_cap);
    let limit = if config.overload_slot {
        (config.courses_per_semester + 1)
            .min(env.config().semester_capacity)
            .min(remaining_cap)
    } else {
        regular
    };

    let mut available = env.valid_actions();
    let mut plan: Vec<String> = Vec::with_capacity(limit);

    for quota in &quotas {
        for _ in 0..quota.min {
            if plan.len() >= regular {
                break;
            }
            let candidates = filter_courses(env, &available, |course| quota.matches(course))?;
            let Some(chosen) = agent.choose_action(&base.with_plan(&plan), &candidates) else {
                break;
            };
            available.retain(|id| id != &chosen);
            plan.push(chosen);
        }
    }

    while plan.len() < limit {
        let counts = quota_counts(env, &quotas, &plan)?;
        let candidates = filter_courses(env, &available, |course| {
            quotas.iter().zip(&counts).all(|(quota, &count)| {
                !quota.matches(course) || quota.max.map_or(true, |max| count < max)
            })
        })?;
        let Some(chosen) = agent.choose_action(&base.with_plan(&plan), &candidates) else {
            break;
        };
        available.retain(|id| id != &chosen);
        plan.push(chosen);
    }

    Ok(plan)
}

fn replay_single_course(
    env: &mut CurriculumEnvironment,
    agent: &mut QLearningAgent,
    config: &PolicyConfig,
) -> Result<Recommendation> {
    let cap = course_cap(env, config);
    let mut state = env.reset();
    let mut semesters: Vec<SemesterPlan> = Vec::new();
    let mut current: Option<SemesterPlan> = None;
    let mut outcome = EpisodeOutcome::InProgress;

    for _ in 0..cap {
        let valid = env.valid_actions();
        let Some(action) = agent.choose_action(&state, &valid) else {
            outcome = EpisodeOutcome::NoValidActions;
            break;
        };
        let semester = env.semester();
        let credits = env.course(&action)?.credits;
        let transition = env.step_course(&action)?;

        let entry = current.get_or_insert_with(|| SemesterPlan {
            semester,
            courses: Vec::new(),
            credits: 0,
            gpa_after: 0.0,
            total_credits_after: 0,
        });
        entry.courses.push(action);
        entry.credits += credits;
        record_progress(entry, &transition);

        if transition.info.semester_completed || transition.done {
            semesters.extend(current.take());
        }
        outcome = transition.info.outcome;
        if transition.done {
            break;
        }
        state = transition.next_state;
    }
    semesters.extend(current.take());

    Ok(finish(env, semesters, outcome))
}

fn record_progress(entry: &mut SemesterPlan, transition: &Transition) {
    entry.gpa_after = transition.info.gpa;
    entry.total_credits_after = transition.info.credits;
}

fn finish(env: &CurriculumEnvironment, semesters: Vec<SemesterPlan>, outcome: EpisodeOutcome) -> Recommendation {
    Recommendation {
        semesters,
        graduated: env.is_graduated(),
        outcome,
        final_gpa: env.gpa(),
        total_credits: env.credits(),
    }
}

fn filter_courses<F>(env: &CurriculumEnvironment, ids: &[String], keep: F) -> Result<Vec<String>>
where
    F: Fn(&Course) -> bool,
{
    let mut kept = Vec::new();
    for id in ids {
        if keep(env.course(id)?) {
            kept.push(id.clone());
        }
    }
    Ok(kept)
}

fn quota_counts(env: &CurriculumEnvironment, quotas: &[CategoryQuota], plan: &[String]) -> Result<Vec<usize>> {
    let mut counts = vec![0; quotas.len()];
    for id in plan {
        let course = env.course(id)?;
        for (count, quota) in counts.iter_mut().zip(quotas) {
            if quota.matches(course) {
                *count += 1;
            }
        }
    }
    Ok(counts)
}

fn plan_credits(env: &CurriculumEnvironment, plan: &[String]) -> Result<u32> {
    plan.iter()
        .map(|id| env.course(id).map(|course| course.credits))
        .sum()
}
