//! Phabric: the bus tying entities, transformations and the datasource together

use crate::config::PhabricConfig;
use crate::datasource::{Datasource, DatasourceError};
use crate::entity::{Entity, EntityConfig};
use crate::registry::{Registry, ENTITIES};
use crate::table::DataTable;
use crate::transform::{builtin, Transformation, TransformationCatalog};
use crate::value::{RecordId, Row, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in Phabric operations
#[derive(Debug, Error)]
pub enum PhabricError {
    #[error("Not registered in {category}: {name}")]
    NotFound { category: &'static str, name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Specified entity name does not map to a registered entity: {0}")]
    EntityNotRegistered(String),

    #[error("No {entity} record named '{name}' has been inserted")]
    RecordNotFound { entity: String, name: String },

    #[error("Transformation {name} failed: {message}")]
    Transformation { name: String, message: String },

    #[error("Table error: {0}")]
    Table(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Datasource error: {0}")]
    Datasource(#[from] DatasourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Phabric operations
pub type PhabricResult<T> = Result<T, PhabricError>;

/// What `Phabric::update_from_table` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Every row matched a tracked name and was updated
    Updated,
    /// The update failed; holds the ids of the rows inserted instead
    Inserted(Vec<RecordId>),
}

/// The bus
///
/// Owns the registered entities and transformations and the datasource they
/// write to. Entities are shared through `Arc`, so an entity handed out by
/// `get_entity` keeps tracking names after the bus inserts through it.
pub struct Phabric {
    datasource: Arc<dyn Datasource>,
    entities: Registry<Arc<Entity>>,
    transformations: TransformationCatalog,
}

impl Phabric {
    pub fn new(datasource: Arc<dyn Datasource>) -> Self {
        Self {
            datasource,
            entities: Registry::new(ENTITIES),
            transformations: TransformationCatalog::new(),
        }
    }

    /// Build a bus with the configured entities and lookup transformations
    pub fn from_config(datasource: Arc<dyn Datasource>, config: &PhabricConfig) -> PhabricResult<Self> {
        let mut bus = Self::new(datasource);
        bus.configure(config)?;
        Ok(bus)
    }

    /// Register the configured entities and lookups on an existing bus
    ///
    /// Configured names replace anything already registered under them.
    pub fn configure(&mut self, config: &PhabricConfig) -> PhabricResult<()> {
        config.validate()?;
        self.create_entities_from_config(config.entities.clone())?;
        for (name, entity) in &config.lookups {
            self.add_data_transformation(name, builtin::lookup(entity.as_str()))?;
        }
        Ok(())
    }

    pub fn datasource(&self) -> &dyn Datasource {
        self.datasource.as_ref()
    }

    // === Entities ===

    /// Create and register an entity
    pub fn create_entity(&mut self, name: &str, config: EntityConfig) -> PhabricResult<Arc<Entity>> {
        let entity = Arc::new(Entity::new(name, config)?);
        self.add_entity(name, entity.clone())?;
        Ok(entity)
    }

    /// Create one entity per key, injecting the key as the entity's name
    pub fn create_entities_from_config<I, K>(&mut self, configs: I) -> PhabricResult<()>
    where
        I: IntoIterator<Item = (K, EntityConfig)>,
        K: Into<String>,
    {
        for (name, mut config) in configs {
            let name = name.into();
            config.entity_name = Some(name.clone());
            self.create_entity(&name, config)?;
        }
        Ok(())
    }

    /// Register an entity under its own name
    ///
    /// `name` must match `Entity::name`, which errors and logs report.
    pub fn add_entity(&mut self, name: &str, entity: impl Into<Arc<Entity>>) -> PhabricResult<()> {
        let entity = entity.into();
        if entity.name() != name {
            return Err(PhabricError::InvalidArgument(format!(
                "entity '{}' cannot be registered as '{}'",
                entity.name(),
                name
            )));
        }
        tracing::debug!(name, "registered entity");
        self.entities.add(name, entity);
        Ok(())
    }

    /// A registered entity; unknown names are an `InvalidArgument`
    pub fn get_entity(&self, name: &str) -> PhabricResult<Arc<Entity>> {
        self.entities
            .get(name)
            .cloned()
            .map_err(|_| PhabricError::InvalidArgument(format!("Entity not registered: {}", name)))
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains(name)
    }

    /// Registered entity names, sorted
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.names()
    }

    fn registered(&self, name: &str) -> PhabricResult<Arc<Entity>> {
        self.entities
            .get(name)
            .cloned()
            .map_err(|_| PhabricError::EntityNotRegistered(name.to_string()))
    }

    // === Transformations ===

    pub fn add_data_transformation(&mut self, name: &str, transformation: Transformation) -> PhabricResult<()> {
        self.transformations.register(name, transformation)
    }

    pub fn get_data_transformation(&self, name: &str) -> PhabricResult<&Transformation> {
        self.transformations.get(name)
    }

    pub fn transformations(&self) -> &TransformationCatalog {
        &self.transformations
    }

    /// Apply the transformation registered as `name`
    ///
    /// Failures raised inside the function are reported under `name`.
    pub fn apply_transformation(&self, name: &str, value: &Value) -> PhabricResult<Value> {
        self.transformations
            .apply(name, value, self)
            .map_err(|e| match e {
                PhabricError::Transformation { message, .. } => PhabricError::Transformation {
                    name: name.to_string(),
                    message,
                },
                other => other,
            })
    }

    // === Fixtures ===

    /// Insert a table through the named entity
    pub fn insert_from_table(
        &self,
        entity: &str,
        table: &DataTable,
        apply_defaults: bool,
    ) -> PhabricResult<Vec<RecordId>> {
        self.registered(entity)?.insert_from_table(self, table, apply_defaults)
    }

    /// Insert pre-parsed rows through the named entity
    pub fn insert_from_array(&self, entity: &str, rows: &[Row], apply_defaults: bool) -> PhabricResult<Vec<RecordId>> {
        self.registered(entity)?.insert_from_array(self, rows, apply_defaults)
    }

    /// Update through the named entity, inserting the rows the update missed
    ///
    /// Any failure of the update triggers the insert, not only an unknown
    /// name: a bad date in an update row is retried as an insert and fails
    /// there instead. Rows are resolved before anything is written, so a
    /// resolution failure inserts the whole table. A datasource failure part
    /// way through inserts only the failed row and the ones after it. Use
    /// `upsert_from_table` to only insert unknown names.
    pub fn update_from_table(&self, entity: &str, table: &DataTable) -> PhabricResult<UpdateOutcome> {
        let entity = self.registered(entity)?;
        let rows = table.hashes();
        match entity.write_updates(self, &rows) {
            Ok(()) => Ok(UpdateOutcome::Updated),
            Err((written, e)) => {
                tracing::warn!(
                    entity = entity.name(),
                    written,
                    error = %e,
                    "update failed; inserting the remaining rows"
                );
                let ids = entity.insert_from_array(self, &rows[written..], true)?;
                Ok(UpdateOutcome::Inserted(ids))
            }
        }
    }

    /// Update rows with a tracked name and insert the others
    pub fn upsert_from_table(
        &self,
        entity: &str,
        table: &DataTable,
        apply_defaults: bool,
    ) -> PhabricResult<Vec<RecordId>> {
        self.registered(entity)?.upsert_from_table(self, table, apply_defaults)
    }

    /// Remove every inserted row and forget every tracked name
    pub fn reset(&self) -> PhabricResult<()> {
        self.datasource.reset()?;
        for entity in self.entities.values() {
            entity.clear();
        }
        tracing::info!(entities = self.entities.len(), "reset fixtures");
        Ok(())
    }
}

impl std::fmt::Debug for Phabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phabric")
            .field("entities", &self.entities.names())
            .field("transformations", &self.transformations.names())
            .finish_non_exhaustive()
    }
}
