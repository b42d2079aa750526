//! Datasources fixtures are written to
//!
//! The bus only talks to storage through the `Datasource` trait: insert a
//! row, update a row by primary key, and reset everything inserted. The
//! primary implementation is `SqliteDatasource`; `MemoryDatasource` keeps
//! rows in process for tests.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryDatasource;
pub use sqlite::SqliteDatasource;
pub use traits::{validate_identifier, Datasource, DatasourceError, DatasourceResult, OpenDatasource};
