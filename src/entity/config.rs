//! Entity configuration

use crate::bus::{PhabricError, PhabricResult};
use crate::datasource::validate_identifier;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_primary_key() -> String {
    "id".to_string()
}

/// One configured column of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Label used in scenario tables
    pub name: String,
    /// Storage column; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Value used when a row leaves the column out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Name of the transformation applied before storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
}

impl ColumnConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            default: None,
            transformation: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_transformation(mut self, transformation: impl Into<String>) -> Self {
        self.transformation = Some(transformation.into());
        self
    }

    /// The storage column this label is written to
    pub fn target(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Configuration of a single entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Name the entity is registered under, injected by
    /// `Phabric::create_entities_from_config`
    #[serde(default, alias = "entityName", skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Storage table
    #[serde(alias = "tableName")]
    pub table: String,
    #[serde(default = "default_primary_key", alias = "primaryKey")]
    pub primary_key: String,
    /// Label of the column scenario authors use to refer to rows
    #[serde(default, alias = "nameCol", skip_serializing_if = "Option::is_none")]
    pub name_column: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

impl EntityConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            entity_name: None,
            table: table.into(),
            primary_key: default_primary_key(),
            name_column: None,
            columns: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_name_column(mut self, label: impl Into<String>) -> Self {
        self.name_column = Some(label.into());
        self
    }

    pub fn with_column(mut self, column: ColumnConfig) -> Self {
        self.columns.push(column);
        self
    }

    /// The configured column with label `name`
    pub fn column(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Storage column a scenario label is written to
    ///
    /// Labels without configuration are written under their own name.
    pub fn target_of<'a>(&'a self, label: &'a str) -> &'a str {
        self.column(label).map(ColumnConfig::target).unwrap_or(label)
    }

    /// Check identifiers, duplicate labels and transformation names
    pub fn validate(&self) -> PhabricResult<()> {
        let invalid = |what: &str, e: crate::datasource::DatasourceError| {
            PhabricError::InvalidArgument(format!("{} in entity for table '{}': {}", what, self.table, e))
        };

        validate_identifier(&self.table).map_err(|e| invalid("table", e))?;
        validate_identifier(&self.primary_key).map_err(|e| invalid("primary key", e))?;

        let mut labels = HashSet::new();
        let mut targets = HashSet::new();
        for column in &self.columns {
            if !labels.insert(column.name.as_str()) {
                return Err(PhabricError::InvalidArgument(format!(
                    "duplicate column '{}' in entity for table '{}'",
                    column.name, self.table
                )));
            }
            if !targets.insert(column.target()) {
                return Err(PhabricError::InvalidArgument(format!(
                    "two columns of table '{}' write to '{}'",
                    self.table,
                    column.target()
                )));
            }
            validate_identifier(column.target()).map_err(|e| invalid("column", e))?;
            if let Some(t) = &column.transformation {
                if t.trim().is_empty() {
                    return Err(PhabricError::InvalidArgument(format!(
                        "empty transformation name on column '{}'",
                        column.name
                    )));
                }
            }
        }

        if let Some(name_column) = &self.name_column {
            if name_column.trim().is_empty() {
                return Err(PhabricError::InvalidArgument(format!(
                    "empty name column in entity for table '{}'",
                    self.table
                )));
            }
        }

        Ok(())
    }
}
