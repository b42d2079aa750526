//! In-memory datasource for tests

use super::traits::{validate_identifier, Datasource, DatasourceError, DatasourceResult};
use crate::value::{RecordId, Row};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<String, BTreeMap<RecordId, Row>>,
    next_id: HashMap<String, i64>,
    /// Rows inserted since the last reset, oldest first.
    inserted: Vec<(String, RecordId)>,
    /// Tables whose writes fail, with the reason reported.
    rejected: HashMap<String, String>,
}

impl Tables {
    fn allocate(&mut self, table: &str) -> RecordId {
        let next = self.next_id.entry(table.to_string()).or_insert(1);
        let id = RecordId::new(*next);
        *next += 1;
        id
    }

    fn check_rejected(&self, table: &str) -> DatasourceResult<()> {
        match self.rejected.get(table) {
            Some(reason) => Err(DatasourceError::Constraint {
                table: table.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Datasource that keeps rows in process memory
///
/// Ids are allocated per table starting at 1 and never reused, like an
/// auto-increment column. Tables spring into existence on first write.
#[derive(Debug, Default)]
pub struct MemoryDatasource {
    tables: Mutex<Tables>,
}

impl MemoryDatasource {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> DatasourceResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| DatasourceError::LockPoisoned)
    }

    /// Store a row without tracking it, as if it was loaded by a fixture script
    pub fn seed(&self, table: &str, row: Row) -> DatasourceResult<RecordId> {
        validate_identifier(table)?;
        let mut tables = self.tables()?;
        let id = tables.allocate(table);
        tables.rows.entry(table.to_string()).or_default().insert(id, row);
        Ok(id)
    }

    /// Make every later write to `table` fail with a constraint violation
    pub fn reject_writes(&self, table: &str, reason: impl Into<String>) -> DatasourceResult<()> {
        self.tables()?.rejected.insert(table.to_string(), reason.into());
        Ok(())
    }

    /// Rows of `table` in id order
    pub fn rows(&self, table: &str) -> DatasourceResult<Vec<(RecordId, Row)>> {
        Ok(self
            .tables()?
            .rows
            .get(table)
            .map(|rows| rows.iter().map(|(id, row)| (*id, row.clone())).collect())
            .unwrap_or_default())
    }

    pub fn get(&self, table: &str, id: RecordId) -> DatasourceResult<Option<Row>> {
        Ok(self
            .tables()?
            .rows
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    pub fn count(&self, table: &str) -> DatasourceResult<usize> {
        Ok(self.tables()?.rows.get(table).map(BTreeMap::len).unwrap_or(0))
    }

    /// Rows inserted since the last reset, oldest first
    pub fn tracked(&self) -> DatasourceResult<Vec<(String, RecordId)>> {
        Ok(self.tables()?.inserted.clone())
    }
}

impl Datasource for MemoryDatasource {
    fn insert(&self, table: &str, key_column: &str, row: &Row) -> DatasourceResult<RecordId> {
        validate_identifier(table)?;
        validate_identifier(key_column)?;
        let mut tables = self.tables()?;
        tables.check_rejected(table)?;

        let id = tables.allocate(table);
        tables.rows.entry(table.to_string()).or_default().insert(id, row.clone());
        tables.inserted.push((table.to_string(), id));
        Ok(id)
    }

    fn update(&self, table: &str, key_column: &str, id: RecordId, row: &Row) -> DatasourceResult<()> {
        validate_identifier(table)?;
        validate_identifier(key_column)?;
        let mut tables = self.tables()?;
        tables.check_rejected(table)?;

        let existing = tables
            .rows
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| DatasourceError::RowNotFound {
                table: table.to_string(),
                id,
            })?;
        for (column, value) in row {
            existing.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    fn reset(&self) -> DatasourceResult<()> {
        let mut tables = self.tables()?;
        let inserted = std::mem::take(&mut tables.inserted);
        for (table, id) in inserted.iter().rev() {
            if let Some(rows) = tables.rows.get_mut(table) {
                rows.remove(id);
            }
        }
        Ok(())
    }
}
