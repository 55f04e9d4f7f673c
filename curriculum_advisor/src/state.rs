//! Canonical state keys used to index the learned value table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order-independent encoding of an episode's progress.
///
/// Completed courses and the partial semester plan are stored sorted, and
/// the GPA is kept as a count of half points so the key space stays bounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub completed: Vec<String>,
    pub semester: u32,
    pub gpa_half_points: u8,
    /// Courses already picked for the semester being planned.
    #[serde(default)]
    pub plan: Vec<String>,
}

impl StateKey {
    pub fn new<'a, I>(completed: I, semester: u32, gpa: f64) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            completed: canonical(completed),
            semester,
            gpa_half_points: gpa_bin(gpa),
            plan: Vec::new(),
        }
    }

    /// The same progress, augmented with a partial semester plan.
    pub fn with_plan<S: AsRef<str>>(&self, plan: &[S]) -> Self {
        Self {
            completed: self.completed.clone(),
            semester: self.semester,
            gpa_half_points: self.gpa_half_points,
            plan: canonical(plan.iter().map(AsRef::as_ref)),
        }
    }

    /// Binned GPA in grade points.
    pub fn gpa(&self) -> f64 {
        f64::from(self.gpa_half_points) / 2.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] sem={} gpa={:.1}",
            self.completed.join(","),
            self.semester,
            self.gpa()
        )?;
        if !self.plan.is_empty() {
            write!(f, " plan=[{}]", self.plan.join(","))?;
        }
        Ok(())
    }
}

/// GPA rounded to the nearest half point, as a count of half points.
pub fn gpa_bin(gpa: f64) -> u8 {
    if !gpa.is_finite() {
        return 0;
    }
    (gpa.clamp(0.0, 4.0) * 2.0).round() as u8
}

fn canonical<'a, I>(courses: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut courses: Vec<String> = courses.into_iter().map(str::to_string).collect();
    courses.sort();
    courses.dedup();
    courses
}
