use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A network's full permission matrix as served by the remote source:
/// source node name -> destination node name -> allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AclMatrix(BTreeMap<String, BTreeMap<String, bool>>);

impl AclMatrix {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(&mut self, source: impl Into<String>, dest: impl Into<String>, allowed: bool) {
        self.0.entry(source.into()).or_default().insert(dest.into(), allowed);
    }

    pub fn with(
        mut self,
        source: impl Into<String>,
        dest: impl Into<String>,
        allowed: bool,
    ) -> Self {
        self.set(source, dest, allowed);
        self
    }

    pub fn get(&self, source: &str, dest: &str) -> Option<bool> {
        self.0.get(source)?.get(dest).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, bool>)> {
        self.0.iter().map(|(source, row)| (source.as_str(), row))
    }

    /// Number of (source, destination) cells.
    pub fn cell_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }
}
