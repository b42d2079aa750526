//! SQLite datasource

use super::traits::{validate_identifier, Datasource, DatasourceError, DatasourceResult, OpenDatasource};
use crate::value::{RecordId, Row, Value};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed datasource
///
/// The schema is expected to exist already, either in the database file or
/// loaded through `execute_batch` / `load_fixture`. Ids are the values of the
/// key column each entity names, read back with `RETURNING`; a table without
/// an integer key can use `rowid`.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteDatasource {
    conn: Mutex<Connection>,
    /// Rows inserted since the last reset, oldest first.
    inserted: Mutex<Vec<Inserted>>,
}

#[derive(Debug, Clone)]
struct Inserted {
    table: String,
    key_column: String,
    id: RecordId,
}

impl SqliteDatasource {
    fn from_connection(conn: Connection) -> DatasourceResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            inserted: Mutex::new(Vec::new()),
        })
    }

    fn conn(&self) -> DatasourceResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DatasourceError::LockPoisoned)
    }

    fn inserted(&self) -> DatasourceResult<MutexGuard<'_, Vec<Inserted>>> {
        self.inserted.lock().map_err(|_| DatasourceError::LockPoisoned)
    }

    /// Run raw SQL, e.g. a schema or fixture script
    ///
    /// Rows written this way are not tracked and survive `reset`.
    pub fn execute_batch(&self, sql: &str) -> DatasourceResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    /// Run the SQL script at `path`
    pub fn load_fixture(&self, path: impl AsRef<Path>) -> DatasourceResult<()> {
        let sql = std::fs::read_to_string(path)?;
        self.execute_batch(&sql)
    }

    /// Every row of `table` in rowid order, keyed by column name
    pub fn select_all(&self, table: &str) -> DatasourceResult<Vec<Row>> {
        validate_identifier(table)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote(table)))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map([], |r| {
            let mut row = Row::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                row.insert(name.clone(), r.get::<_, Value>(i)?);
            }
            Ok(row)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Number of rows in `table`
    pub fn count(&self, table: &str) -> DatasourceResult<usize> {
        validate_identifier(table)?;
        let conn = self.conn()?;
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Rows inserted since the last reset, oldest first
    pub fn tracked(&self) -> DatasourceResult<Vec<(String, RecordId)>> {
        Ok(self
            .inserted()?
            .iter()
            .map(|row| (row.table.clone(), row.id))
            .collect())
    }
}

impl OpenDatasource for SqliteDatasource {
    fn open(path: impl AsRef<Path>) -> DatasourceResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> DatasourceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl Datasource for SqliteDatasource {
    fn insert(&self, table: &str, key_column: &str, row: &Row) -> DatasourceResult<RecordId> {
        validate_identifier(table)?;
        validate_identifier(key_column)?;
        for column in row.keys() {
            validate_identifier(column)?;
        }

        let insert = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(table))
        } else {
            let columns: Vec<String> = row.keys().map(|c| quote(c)).collect();
            let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let sql = format!("{} RETURNING {}", insert, quote(key_column));

        let id = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let key: Value = tx.query_row(&sql, params_from_iter(row.values()), |r| r.get(0))?;
            // Dropping the transaction rolls the insert back.
            let id = key.as_int().ok_or_else(|| DatasourceError::Constraint {
                table: table.to_string(),
                reason: format!("key column {} is not an integer: {}", key_column, key),
            })?;
            tx.commit()?;
            RecordId::new(id)
        };
        self.inserted()?.push(Inserted {
            table: table.to_string(),
            key_column: key_column.to_string(),
            id,
        });

        tracing::debug!(table, %id, "inserted row");
        Ok(id)
    }

    fn update(&self, table: &str, key_column: &str, id: RecordId, row: &Row) -> DatasourceResult<()> {
        validate_identifier(table)?;
        validate_identifier(key_column)?;
        for column in row.keys() {
            validate_identifier(column)?;
        }

        let assignments: Vec<String> = if row.is_empty() {
            vec![format!("{0} = {0}", quote(key_column))]
        } else {
            row.keys()
                .enumerate()
                .map(|(i, c)| format!("{} = ?{}", quote(c), i + 1))
                .collect()
        };
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote(table),
            assignments.join(", "),
            quote(key_column),
            row.len() + 1
        );

        let mut params: Vec<Value> = row.values().cloned().collect();
        params.push(Value::from(id));

        let changed = self.conn()?.execute(&sql, params_from_iter(params.iter()))?;
        if changed == 0 {
            return Err(DatasourceError::RowNotFound {
                table: table.to_string(),
                id,
            });
        }

        tracing::debug!(table, %id, "updated row");
        Ok(())
    }

    fn reset(&self) -> DatasourceResult<()> {
        let mut inserted = self.inserted()?;
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        for row in inserted.iter().rev() {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    quote(&row.table),
                    quote(&row.key_column)
                ),
                [row.id.get()],
            )?;
        }
        tx.commit()?;

        tracing::info!(rows = inserted.len(), "reset datasource");
        inserted.clear();
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}
