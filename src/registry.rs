//! Named registries for entities and data transformations

use crate::bus::{PhabricError, PhabricResult};
use std::collections::HashMap;

/// Category label for registered entities
pub const ENTITIES: &str = "phabric-entities";

/// Category label for registered data transformations
pub const DATA_TRANSFORMATIONS: &str = "phabric-data-transformations";

/// A single category of named values
///
/// Each category lives in its own typed registry, so a lookup can only fail
/// because the name is missing; the category label is carried into
/// `PhabricError::NotFound` for diagnostics. Re-adding a name replaces the
/// previous value.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    category: &'static str,
    entries: HashMap<String, T>,
}

impl<T> Registry<T> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            entries: HashMap::new(),
        }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Store a value, returning the one it replaced
    pub fn add(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        let name = name.into();
        let previous = self.entries.insert(name.clone(), value);
        if previous.is_some() {
            tracing::warn!(category = self.category, name = %name, "replaced registry entry");
        }
        previous
    }

    pub fn get(&self, name: &str) -> PhabricResult<&T> {
        self.entries.get(name).ok_or_else(|| PhabricError::NotFound {
            category: self.category,
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
