use std::collections::{BTreeMap, HashSet};

use crate::error::{MonitorError, Result};

/// Monitored services keyed by their column position on the scoreboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    entries: Vec<(usize, String)>,
}

impl ServiceCatalog {
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (index, name) in entries {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(MonitorError::InvalidConfig(format!(
                    "service {} has an empty name",
                    index
                )));
            }
            if map.insert(index, name).is_some() {
                return Err(MonitorError::InvalidConfig(format!(
                    "service index {} configured twice",
                    index
                )));
            }
        }

        if map.is_empty() {
            return Err(MonitorError::InvalidConfig(
                "at least one service must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in map.values() {
            if !seen.insert(name.as_str()) {
                return Err(MonitorError::InvalidConfig(format!(
                    "service name '{}' configured twice",
                    name
                )));
            }
        }

        Ok(Self {
            entries: map.into_iter().collect(),
        })
    }

    /// Parse the `[services]` table, whose keys are stringified indices
    pub fn from_config(raw: &BTreeMap<String, String>) -> Result<Self> {
        let mut entries = Vec::with_capacity(raw.len());
        for (key, name) in raw {
            let index = key.trim().parse::<usize>().map_err(|_| {
                MonitorError::InvalidConfig(format!(
                    "service key '{}' is not a non-negative index",
                    key
                ))
            })?;
            entries.push((index, name.clone()));
        }
        Self::new(entries)
    }

    /// (index, name) pairs ordered by index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|(i, n)| (*i, n.as_str()))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, n)| n.as_str())
    }

    /// Highest configured index; rounds must list at least this many + 1 services
    pub fn max_index(&self) -> usize {
        self.entries.last().map(|(i, _)| *i).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
