//! Course prerequisite network.
//!
//! The environment only sees the read-only [`CourseGraph`] trait. The
//! [`CatalogGraph`] implementation builds a `petgraph` DAG from an already
//! cleaned course list and derives each course's prerequisite level.

use crate::error::{AdvisorError, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

/// Course classification used by the graduation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    Core,
    Elective,
    #[default]
    General,
}

/// Immutable attributes of a course node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub credits: u32,
    pub course_type: CourseType,
    pub category: String,
    /// `None` for courses that belong to no track.
    pub track: Option<String>,
    pub compulsory: bool,
    pub fail_rate: f64,
    pub average_grade: f64,
    /// Numeric course code fed to the grade predictor.
    pub code: u32,
    /// Workload rating from 1 (light) to 5 (heavy).
    pub workload: u8,
    /// Depth in the prerequisite hierarchy; root courses are level 1.
    pub level: u32,
}

/// One row of a cleaned course catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub credits: u32,
    #[serde(default, rename = "type")]
    pub course_type: CourseType,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_track")]
    pub track: Option<String>,
    #[serde(default)]
    pub compulsory: bool,
    #[serde(default)]
    pub fail_rate: f64,
    #[serde(default = "default_average_grade")]
    pub average_grade: f64,
    #[serde(default)]
    pub code: u32,
    #[serde(default = "default_workload")]
    pub workload: u8,
    /// Declared level; derived from the graph when absent.
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

fn default_category() -> String {
    "Other".to_string()
}

fn default_average_grade() -> f64 {
    3.0
}

fn default_workload() -> u8 {
    3
}

fn deserialize_track<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|track| track.trim().to_string())
        .filter(|track| !track.is_empty() && !track.eq_ignore_ascii_case("none")))
}

impl CourseRecord {
    pub fn new(id: impl Into<String>, credits: u32, course_type: CourseType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            credits,
            course_type,
            category: default_category(),
            track: None,
            compulsory: false,
            fail_rate: 0.0,
            average_grade: default_average_grade(),
            code: 0,
            workload: default_workload(),
            level: None,
            prerequisites: Vec::new(),
        }
    }

    pub fn requires<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_track(mut self, track: impl Into<String>) -> Self {
        self.track = Some(track.into());
        self
    }

    pub fn with_history(mut self, fail_rate: f64, average_grade: f64) -> Self {
        self.fail_rate = fail_rate;
        self.average_grade = average_grade;
        self
    }

    pub fn compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AdvisorError::config("course id cannot be empty"));
        }
        if self.credits == 0 {
            return Err(AdvisorError::config(format!(
                "course '{}' must carry a positive credit count",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(AdvisorError::config(format!(
                "course '{}' fail rate {} is outside [0, 1]",
                self.id, self.fail_rate
            )));
        }
        if !(0.0..=4.0).contains(&self.average_grade) {
            return Err(AdvisorError::config(format!(
                "course '{}' average grade {} is outside [0, 4]",
                self.id, self.average_grade
            )));
        }
        Ok(())
    }

    fn into_course(self, level: u32) -> Course {
        Course {
            id: self.id,
            name: self.name,
            credits: self.credits,
            course_type: self.course_type,
            category: self.category,
            track: self.track,
            compulsory: self.compulsory,
            fail_rate: self.fail_rate,
            average_grade: self.average_grade,
            code: self.code,
            workload: self.workload.clamp(1, 5),
            level: self.level.unwrap_or(level),
        }
    }
}

/// Read-only view of the course prerequisite network.
pub trait CourseGraph: Send + Sync {
    /// All course identifiers in a stable order.
    fn course_ids(&self) -> Vec<&str>;

    fn course(&self, id: &str) -> Option<&Course>;

    /// Direct prerequisites of `id`.
    fn prerequisites(&self, id: &str) -> Vec<&str>;

    /// Courses that list `id` as a direct prerequisite.
    fn successors(&self, id: &str) -> Vec<&str>;

    fn out_degree(&self, id: &str) -> usize {
        self.successors(id).len()
    }
}

/// On-disk catalog layout: `courses = [...]` in TOML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub courses: Vec<CourseRecord>,
}

/// In-memory prerequisite DAG built from catalog records.
pub struct CatalogGraph {
    graph: DiGraph<Course, ()>,
    index: HashMap<String, NodeIndex>,
    order: Vec<String>,
}

impl CatalogGraph {
    /// Build the graph, derive prerequisite levels and reject cycles.
    ///
    /// Prerequisites that name unknown courses are skipped with a warning.
    pub fn from_records(records: Vec<CourseRecord>) -> Result<Self> {
        let mut graph: DiGraph<CourseRecord, ()> = DiGraph::new();
        let mut index = HashMap::with_capacity(records.len());

        for record in records {
            record.validate()?;
            if index.contains_key(&record.id) {
                return Err(AdvisorError::DuplicateCourse(record.id));
            }
            let id = record.id.clone();
            let node = graph.add_node(record);
            index.insert(id, node);
        }

        let mut edges = Vec::new();
        for node in graph.node_indices() {
            let record = &graph[node];
            for prerequisite in &record.prerequisites {
                match index.get(prerequisite) {
                    Some(&source) => edges.push((source, node)),
                    None => warn!(
                        course = %record.id,
                        prerequisite = %prerequisite,
                        "Missing prerequisite target; edge skipped"
                    ),
                }
            }
        }
        for (source, target) in edges {
            graph.update_edge(source, target, ());
        }

        let levels = prerequisite_levels(&graph, |record| record.id.as_str())?;
        let graph = graph.map(|node, record| record.clone().into_course(levels[&node]), |_, _| ());

        let mut order: Vec<String> = index.keys().cloned().collect();
        order.sort();

        info!(
            courses = graph.node_count(),
            prerequisites = graph.edge_count(),
            "Course prerequisite network built"
        );

        Ok(Self { graph, index, order })
    }

    /// Load a catalog from a `.json` or `.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalog: CatalogFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => toml::from_str(&contents)?,
        };
        debug!(path = ?path, records = catalog.courses.len(), "Catalog loaded");
        Self::from_records(catalog.courses)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<&str> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].id.as_str())
            .collect();
        neighbors.sort_unstable();
        neighbors
    }
}

impl CourseGraph for CatalogGraph {
    fn course_ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    fn course(&self, id: &str) -> Option<&Course> {
        self.index.get(id).map(|&node| &self.graph[node])
    }

    fn prerequisites(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn out_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|&node| self.graph.neighbors_directed(node, Direction::Outgoing).count())
            .unwrap_or(0)
    }
}

/// Depth of every node in the prerequisite hierarchy.
///
/// Iterative topological walk with a work queue and a visited set; any node
/// never released from the queue sits on or behind a cycle.
fn prerequisite_levels<N, F>(graph: &DiGraph<N, ()>, name: F) -> Result<HashMap<NodeIndex, u32>>
where
    F: Fn(&N) -> &str,
{
    let mut pending: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|node| (node, graph.neighbors_directed(node, Direction::Incoming).count()))
        .collect();
    let mut levels: HashMap<NodeIndex, u32> = HashMap::with_capacity(graph.node_count());
    let mut visited: HashSet<NodeIndex> = HashSet::with_capacity(graph.node_count());
    let mut queue: VecDeque<NodeIndex> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&node, _)| node)
        .collect();

    for &root in &queue {
        levels.insert(root, 1);
    }

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        let level = levels[&node];
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            let entry = levels.entry(next).or_insert(0);
            *entry = (*entry).max(level + 1);
            if let Some(count) = pending.get_mut(&next) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if visited.len() < graph.node_count() {
        let mut courses: Vec<String> = graph
            .node_indices()
            .filter(|node| !visited.contains(node))
            .map(|node| name(&graph[node]).to_string())
            .collect();
        courses.sort();
        return Err(AdvisorError::CyclicPrerequisites { courses });
    }

    Ok(levels)
}
