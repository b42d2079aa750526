//! Phabric: fixture management for behaviour-driven database tests
//!
//! Turns the tables written in scenario steps into rows in a database,
//! remembers which id every named row was given so later steps can refer to
//! it, and removes everything it wrote on reset.
//!
//! # Core Concepts
//!
//! - **Bus** (`Phabric`): owns the datasource, entities and transformations
//! - **Entities**: one per table; apply defaults and transformations, track name → id
//! - **Transformations**: named functions converting scenario values to stored values
//! - **Datasource**: where rows go; `SqliteDatasource` or `MemoryDatasource`
//!
//! # Example
//!
//! ```
//! use phabric::{builtin, ColumnConfig, DataTable, EntityConfig, MemoryDatasource, Phabric};
//! use std::sync::Arc;
//!
//! let mut bus = Phabric::new(Arc::new(MemoryDatasource::new()));
//! bus.add_data_transformation("UKTOMYSQLDATE", builtin::uk_to_sql_date()).unwrap();
//! bus.create_entity(
//!     "event",
//!     EntityConfig::new("event")
//!         .with_name_column("Name")
//!         .with_column(ColumnConfig::new("Name").with_column("name"))
//!         .with_column(ColumnConfig::new("Date").with_column("datetime").with_transformation("UKTOMYSQLDATE")),
//! )
//! .unwrap();
//!
//! let table = DataTable::parse("| Name | Date |\n| PHPNW | 08/10/2011 09:00 |").unwrap();
//! let ids = bus.insert_from_table("event", &table, true).unwrap();
//! assert_eq!(bus.get_entity("event").unwrap().get_named_item_id("PHPNW").unwrap(), ids[0]);
//! ```

mod bus;
pub mod config;
pub mod datasource;
mod entity;
pub mod registry;
mod table;
pub mod transform;
mod value;

pub use bus::{Phabric, PhabricError, PhabricResult, UpdateOutcome};
pub use config::{DatabaseConfig, PhabricConfig};
pub use datasource::{
    Datasource, DatasourceError, DatasourceResult, MemoryDatasource, OpenDatasource, SqliteDatasource,
};
pub use entity::{ColumnConfig, Entity, EntityConfig};
pub use table::DataTable;
pub use transform::{builtin, Transformation, TransformationCatalog};
pub use value::{row, RecordId, Row, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
