//! YAML configuration
//!
//! ```yaml
//! database:
//!   path: conference.db
//!   fixture: fixture.sql
//! lookups:
//!   ATTENDEELOOKUP: attendee
//! entities:
//!   attendee:
//!     table: attendee
//!     name_column: Name
//!     columns:
//!       - { name: Name, column: name }
//! ```

use crate::bus::{PhabricError, PhabricResult};
use crate::entity::EntityConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the CLI finds its database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; in-memory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// SQL script run before any fixtures are loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhabricConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
    /// Lookup transformations: transformation name to the entity it resolves names in
    #[serde(default)]
    pub lookups: IndexMap<String, String>,
    /// Entities by name, in file order
    #[serde(default)]
    pub entities: IndexMap<String, EntityConfig>,
}

impl PhabricConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> PhabricResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file; relative database paths are taken from the file's directory
    pub fn load(path: impl AsRef<Path>) -> PhabricResult<Self> {
        let path = path.as_ref();
        let mut config = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        tracing::debug!(path = %path.display(), entities = config.entities.len(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> PhabricResult<()> {
        for (name, entity) in &self.entities {
            if name.trim().is_empty() {
                return Err(PhabricError::InvalidArgument("empty entity name".to_string()));
            }
            entity.validate()?;
        }
        for (transformation, entity) in &self.lookups {
            if transformation.trim().is_empty() {
                return Err(PhabricError::InvalidArgument(
                    "empty lookup transformation name".to_string(),
                ));
            }
            if !self.entities.contains_key(entity) {
                return Err(PhabricError::InvalidArgument(format!(
                    "lookup {} refers to unknown entity '{}'",
                    transformation, entity
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(db) = &mut self.database {
            for p in [&mut db.path, &mut db.fixture].into_iter().flatten() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }
}
