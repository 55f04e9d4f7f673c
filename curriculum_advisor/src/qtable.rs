//! Sparse state -> action -> value table and its file persistence.

use crate::error::Result;
use crate::state::StateKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

const SNAPSHOT_VERSION: u32 = 1;

/// Only visited (state, action) pairs are stored; everything else reads as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<StateKey, HashMap<String, f64>>,
}

/// Flattened, deterministically ordered form of a [`QTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableSnapshot {
    pub version: u32,
    pub states: Vec<StateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub state: StateKey,
    pub actions: Vec<ActionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub action: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Bincode,
}

impl Format {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") => Format::Bincode,
            _ => Format::Json,
        }
    }
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: &StateKey, action: &str) -> f64 {
        self.values
            .get(state)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, state: &StateKey, action: &str, value: f64) {
        self.values
            .entry(state.clone())
            .or_default()
            .insert(action.to_string(), value);
    }

    /// Largest value over `actions` in `state`, or 0 when `actions` is empty.
    pub fn max_value<S: AsRef<str>>(&self, state: &StateKey, actions: &[S]) -> f64 {
        actions
            .iter()
            .map(|action| self.get(state, action.as_ref()))
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    pub fn state_count(&self) -> usize {
        self.values.len()
    }

    pub fn entry_count(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn snapshot(&self) -> QTableSnapshot {
        let mut states: Vec<StateEntry> = self
            .values
            .iter()
            .map(|(state, actions)| {
                let mut actions: Vec<ActionValue> = actions
                    .iter()
                    .map(|(action, &value)| ActionValue {
                        action: action.clone(),
                        value,
                    })
                    .collect();
                actions.sort_by(|a, b| a.action.cmp(&b.action));
                StateEntry {
                    state: state.clone(),
                    actions,
                }
            })
            .collect();
        states.sort_by(|a, b| a.state.cmp(&b.state));

        QTableSnapshot {
            version: SNAPSHOT_VERSION,
            states,
        }
    }

    pub fn from_snapshot(snapshot: QTableSnapshot) -> Self {
        let values = snapshot
            .states
            .into_iter()
            .map(|entry| {
                let actions = entry
                    .actions
                    .into_iter()
                    .map(|av| (av.action, av.value))
                    .collect();
                (entry.state, actions)
            })
            .collect();
        Self { values }
    }

    /// Write the table as JSON, or bincode when the path ends in `.bin`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = self.snapshot();
        let mut writer = BufWriter::new(File::create(path)?);
        match Format::for_path(path) {
            Format::Json => serde_json::to_writer_pretty(&mut writer, &snapshot)?,
            Format::Bincode => bincode::serialize_into(&mut writer, &snapshot)?,
        }
        writer.flush()?;
        info!(
            path = ?path,
            states = self.state_count(),
            entries = self.entry_count(),
            "Q-table saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: QTableSnapshot = match Format::for_path(path) {
            Format::Json => serde_json::from_reader(reader)?,
            Format::Bincode => bincode::deserialize_from(reader)?,
        };
        debug!(path = ?path, version = snapshot.version, "Q-table snapshot read");
        let table = Self::from_snapshot(snapshot);
        info!(path = ?path, states = table.state_count(), "Q-table loaded");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const NONE: [&str; 0] = [];

    fn populated() -> QTable {
        let mut table = QTable::new();
        let root = StateKey::new(NONE, 1, 3.0);
        let after_a = StateKey::new(["A"], 1, 3.5);
        table.set(&root, "A", 1.25);
        table.set(&root, "B", -0.1 + 0.2);
        table.set(&after_a, "C", 1.0 / 3.0);
        table.set(&after_a.with_plan(&["C"]), "D", -42.0);
        table
    }

    #[test]
    fn test_unvisited_pairs_read_zero() {
        let table = populated();
        let root = StateKey::new(NONE, 1, 3.0);
        assert_eq!(table.get(&root, "A"), 1.25);
        assert_eq!(table.get(&root, "Z"), 0.0);
        assert_eq!(table.get(&StateKey::new(["Q"], 9, 1.0), "A"), 0.0);
        assert_eq!(table.state_count(), 3);
        assert_eq!(table.entry_count(), 4);
    }

    #[test]
    fn test_set_overwrites_within_existing_state() {
        let mut table = populated();
        let root = StateKey::new(NONE, 1, 3.0);
        table.set(&root, "A", 2.0);
        table.set(&root, "C", 0.5);
        assert_eq!(table.get(&root, "A"), 2.0);
        assert_eq!(table.get(&root, "C"), 0.5);
        assert_eq!(table.state_count(), 3);
        assert_eq!(table.entry_count(), 5);
    }

    #[test]
    fn test_max_value_defaults_to_zero_when_terminal() {
        let table = populated();
        let root = StateKey::new(NONE, 1, 3.0);
        assert_eq!(table.max_value::<&str>(&root, &[]), 0.0);
        assert_eq!(table.max_value(&root, &["A", "B", "Z"]), 1.25);
        let after_a = StateKey::new(["A"], 1, 3.5);
        assert_eq!(table.max_value(&after_a.with_plan(&["C"]), &["D"]), -42.0);
    }

    #[test]
    fn test_json_round_trip_preserves_exact_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("qtable.json");
        let table = populated();
        table.save(&path).unwrap();

        let loaded = QTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.get(&StateKey::new(NONE, 1, 3.0), "missing"), 0.0);
    }

    #[test]
    fn test_bincode_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qtable.bin");
        let table = populated();
        table.save(&path).unwrap();
        assert_eq!(QTable::load(&path).unwrap(), table);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let snapshot = populated().snapshot();
        let states: Vec<_> = snapshot.states.iter().map(|s| s.state.clone()).collect();
        let mut sorted = states.clone();
        sorted.sort();
        assert_eq!(states, sorted);
        assert_eq!(snapshot.states[0].actions[0].action, "A");
    }
}
