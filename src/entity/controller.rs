//! Entity: fixture controller for one table

use super::config::EntityConfig;
use crate::bus::{Phabric, PhabricError, PhabricResult};
use crate::table::DataTable;
use crate::value::{RecordId, Row, Value};
use dashmap::DashMap;

/// Writes scenario rows to one table and remembers the ids it was given
///
/// Rows are resolved in a fixed order: configured defaults, then the
/// provided values on top, then each bound transformation, then labels are
/// renamed to storage columns. When the entity has a name column, the raw
/// (untransformed) name of every inserted row is mapped to its id; inserting
/// the same name twice keeps the later id.
#[derive(Debug)]
pub struct Entity {
    name: String,
    config: EntityConfig,
    index: DashMap<String, RecordId>,
}

impl Entity {
    /// Create an entity after validating its configuration
    pub fn new(name: impl Into<String>, mut config: EntityConfig) -> PhabricResult<Self> {
        let name = name.into();
        config.validate()?;
        config.entity_name.get_or_insert_with(|| name.clone());
        Ok(Self {
            name,
            config,
            index: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Insert every data row of `table`, returning the generated ids in order
    pub fn insert_from_table(
        &self,
        bus: &Phabric,
        table: &DataTable,
        apply_defaults: bool,
    ) -> PhabricResult<Vec<RecordId>> {
        self.insert_from_array(bus, &table.hashes(), apply_defaults)
    }

    /// Insert pre-parsed rows keyed by column label
    pub fn insert_from_array(
        &self,
        bus: &Phabric,
        rows: &[Row],
        apply_defaults: bool,
    ) -> PhabricResult<Vec<RecordId>> {
        rows.iter()
            .map(|row| self.insert_row(bus, row, apply_defaults))
            .collect()
    }

    /// Update rows inserted earlier, found through the name column
    ///
    /// Every row is resolved before anything is written, so an unknown name
    /// fails with `RecordNotFound` and leaves the datasource untouched.
    /// Defaults are not applied. This never inserts.
    pub fn update_from_table(&self, bus: &Phabric, table: &DataTable) -> PhabricResult<()> {
        self.update_from_array(bus, &table.hashes())
    }

    /// Array form of `update_from_table`
    pub fn update_from_array(&self, bus: &Phabric, rows: &[Row]) -> PhabricResult<()> {
        self.write_updates(bus, rows).map_err(|(_, e)| e)
    }

    /// Update `rows` in order; on failure also report how many were written
    ///
    /// Resolution failures happen before any write and report zero.
    pub(crate) fn write_updates(&self, bus: &Phabric, rows: &[Row]) -> Result<(), (usize, PhabricError)> {
        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let resolved = self
                .required_name(row)
                .and_then(|name| self.get_named_item_id(&name))
                .and_then(|id| self.resolve_row(bus, row, false).map(|resolved| (id, resolved)));
            pending.push(resolved.map_err(|e| (0usize, e))?);
        }

        for (written, (id, resolved)) in pending.iter().enumerate() {
            bus.datasource()
                .update(&self.config.table, &self.config.primary_key, *id, resolved)
                .map_err(|e| (written, PhabricError::from(e)))?;
            tracing::debug!(entity = %self.name, %id, "updated fixture row");
        }
        Ok(())
    }

    /// Update rows whose name is known and insert the rest
    ///
    /// Returns the id of every row, updated or inserted, in order. Failures
    /// other than an unknown name are returned as they are.
    pub fn upsert_from_table(
        &self,
        bus: &Phabric,
        table: &DataTable,
        apply_defaults: bool,
    ) -> PhabricResult<Vec<RecordId>> {
        let mut ids = Vec::with_capacity(table.len());
        for row in table.hashes() {
            let name = self.required_name(&row)?;
            let id = match self.index.get(&name).map(|entry| *entry.value()) {
                Some(id) => {
                    let resolved = self.resolve_row(bus, &row, false)?;
                    bus.datasource()
                        .update(&self.config.table, &self.config.primary_key, id, &resolved)?;
                    tracing::debug!(entity = %self.name, %id, "upsert updated fixture row");
                    id
                }
                None => self.insert_row(bus, &row, apply_defaults)?,
            };
            ids.push(id);
        }
        Ok(ids)
    }

    /// Id recorded for `name` by an earlier insert
    pub fn get_named_item_id(&self, name: &str) -> PhabricResult<RecordId> {
        self.index
            .get(name)
            .map(|entry| *entry.value())
            .ok_or_else(|| PhabricError::RecordNotFound {
                entity: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn has_named_item(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Every recorded name and id, ordered by id
    pub fn named_items(&self) -> Vec<(String, RecordId)> {
        let mut items: Vec<(String, RecordId)> = self
            .index
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        items.sort_by_key(|(_, id)| *id);
        items
    }

    /// Forget every recorded name
    pub fn clear(&self) {
        self.index.clear();
    }

    /// Turn a scenario row into the row written to the datasource
    pub fn resolve_row(&self, bus: &Phabric, row: &Row, apply_defaults: bool) -> PhabricResult<Row> {
        let mut merged = Row::with_capacity(self.config.columns.len().max(row.len()));
        if apply_defaults {
            for column in &self.config.columns {
                if let Some(default) = &column.default {
                    merged.insert(column.name.clone(), default.clone());
                }
            }
        }
        for (label, value) in row {
            merged.insert(label.clone(), value.clone());
        }

        let mut resolved = Row::with_capacity(merged.len());
        for (label, value) in merged {
            let column = self.config.column(&label);
            let value = match column.and_then(|c| c.transformation.as_deref()) {
                Some(transformation) => bus.apply_transformation(transformation, &value)?,
                None => value,
            };
            let target = column.map(|c| c.target()).unwrap_or(label.as_str());
            resolved.insert(target.to_string(), value);
        }
        Ok(resolved)
    }

    fn insert_row(&self, bus: &Phabric, row: &Row, apply_defaults: bool) -> PhabricResult<RecordId> {
        let resolved = self.resolve_row(bus, row, apply_defaults)?;
        let id = bus
            .datasource()
            .insert(&self.config.table, &self.config.primary_key, &resolved)?;
        tracing::debug!(entity = %self.name, %id, "inserted fixture row");

        if let Some(name) = self.name_of(row) {
            if let Some(previous) = self.index.insert(name.clone(), id) {
                tracing::warn!(
                    entity = %self.name,
                    name = %name,
                    %previous,
                    %id,
                    "name inserted twice; keeping the newer id"
                );
            }
        }
        Ok(id)
    }

    /// Raw value of the name column in `row`, by label or storage column
    fn name_of(&self, row: &Row) -> Option<String> {
        let label = self.config.name_column.as_deref()?;
        let value = row.get(label).or_else(|| row.get(self.config.target_of(label)))?;
        match value {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn required_name(&self, row: &Row) -> PhabricResult<String> {
        let label = self.config.name_column.as_deref().ok_or_else(|| {
            PhabricError::InvalidArgument(format!("entity '{}' has no name column", self.name))
        })?;
        self.name_of(row).ok_or_else(|| {
            PhabricError::InvalidArgument(format!(
                "row for entity '{}' has no value for name column '{}'",
                self.name, label
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{DatasourceError, MemoryDatasource};
    use crate::entity::ColumnConfig;
    use crate::transform::builtin;
    use crate::value::row;
    use std::sync::Arc;

    fn event_config() -> EntityConfig {
        EntityConfig::new("event")
            .with_name_column("Name")
            .with_column(ColumnConfig::new("Name").with_column("name"))
            .with_column(
                ColumnConfig::new("Date")
                    .with_column("datetime")
                    .with_transformation("UKTOMYSQLDATE"),
            )
            .with_column(ColumnConfig::new("Desc").with_column("description").with_default("TBC"))
            .with_column(ColumnConfig::new("Venue").with_column("venue"))
    }

    fn setup() -> (Arc<MemoryDatasource>, Phabric, Entity) {
        let ds = Arc::new(MemoryDatasource::new());
        let mut bus = Phabric::new(ds.clone());
        bus.add_data_transformation("UKTOMYSQLDATE", builtin::uk_to_sql_date())
            .unwrap();
        let entity = Entity::new("event", event_config()).unwrap();
        (ds, bus, entity)
    }

    fn events() -> DataTable {
        DataTable::parse(
            "| Name  | Date             | Venue        |\n\
             | PHPNW | 08/10/2011 09:00 | Ramada Hotel |\n\
             | PHPUK | 27/02/2012 09:00 | London       |",
        )
        .unwrap()
    }

    #[test]
    fn test_entity_name_injected() {
        let (_, _, entity) = setup();
        assert_eq!(entity.config().entity_name.as_deref(), Some("event"));
        assert_eq!(entity.table(), "event");
    }

    #[test]
    fn test_resolve_applies_defaults_then_transformations() {
        let (_, bus, entity) = setup();
        let resolved = entity
            .resolve_row(&bus, &row([("Name", "PHPNW"), ("Date", "08/10/2011 09:00")]), true)
            .unwrap();
        assert_eq!(
            resolved,
            row([
                ("description", "TBC"),
                ("name", "PHPNW"),
                ("datetime", "2011-10-08 09:00:00"),
            ])
        );
    }

    #[test]
    fn test_provided_value_overrides_default() {
        let (_, bus, entity) = setup();
        let resolved = entity
            .resolve_row(&bus, &row([("Name", "PHPNW"), ("Desc", "Great")]), true)
            .unwrap();
        assert_eq!(resolved["description"], Value::text("Great"));
    }

    #[test]
    fn test_defaults_skipped_when_disabled() {
        let (_, bus, entity) = setup();
        let resolved = entity.resolve_row(&bus, &row([("Name", "PHPNW")]), false).unwrap();
        assert_eq!(resolved, row([("name", "PHPNW")]));
    }

    #[test]
    fn test_transformation_sees_defaulted_value() {
        let ds = Arc::new(MemoryDatasource::new());
        let mut bus = Phabric::new(ds);
        bus.add_data_transformation("SNAKECASE", builtin::snake_case()).unwrap();
        let entity = Entity::new(
            "session",
            EntityConfig::new("session").with_column(
                ColumnConfig::new("Slug")
                    .with_default("Keynote Session")
                    .with_transformation("SNAKECASE"),
            ),
        )
        .unwrap();
        let resolved = entity.resolve_row(&bus, &Row::new(), true).unwrap();
        assert_eq!(resolved["Slug"], Value::text("keynote_session"));
    }

    #[test]
    fn test_unconfigured_labels_pass_through() {
        let (_, bus, entity) = setup();
        let resolved = entity
            .resolve_row(&bus, &row([("Name", "PHPNW"), ("capacity", "300")]), false)
            .unwrap();
        assert_eq!(resolved["capacity"], Value::text("300"));
    }

    #[test]
    fn test_insert_records_names() {
        let (ds, bus, entity) = setup();
        let ids = entity.insert_from_table(&bus, &events(), true).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(entity.get_named_item_id("PHPNW").unwrap(), ids[0]);
        assert_eq!(entity.get_named_item_id("PHPUK").unwrap(), ids[1]);

        let stored = ds.get("event", ids[1]).unwrap().unwrap();
        assert_eq!(stored["datetime"], Value::text("2012-02-27 09:00:00"));
        assert_eq!(stored["description"], Value::text("TBC"));
    }

    #[test]
    fn test_table_and_array_insert_identically() {
        let (table_ds, bus, entity) = setup();
        entity.insert_from_table(&bus, &events(), true).unwrap();

        let (array_ds, bus, entity) = setup();
        let rows = vec![
            row([("Name", "PHPNW"), ("Date", "08/10/2011 09:00"), ("Venue", "Ramada Hotel")]),
            row([("Name", "PHPUK"), ("Date", "27/02/2012 09:00"), ("Venue", "London")]),
        ];
        entity.insert_from_array(&bus, &rows, true).unwrap();

        assert_eq!(table_ds.rows("event").unwrap(), array_ds.rows("event").unwrap());
    }

    #[test]
    fn test_duplicate_name_keeps_latest() {
        let (_, bus, entity) = setup();
        let first = entity.insert_from_array(&bus, &[row([("Name", "PHPNW")])], true).unwrap();
        let second = entity.insert_from_array(&bus, &[row([("Name", "PHPNW")])], true).unwrap();
        assert_ne!(first, second);
        assert_eq!(entity.get_named_item_id("PHPNW").unwrap(), second[0]);
        assert_eq!(entity.named_items().len(), 1);
    }

    #[test]
    fn test_name_is_recorded_before_transformation() {
        let ds = Arc::new(MemoryDatasource::new());
        let mut bus = Phabric::new(ds.clone());
        bus.add_data_transformation("SNAKECASE", builtin::snake_case()).unwrap();
        let entity = Entity::new(
            "attendee",
            EntityConfig::new("attendee")
                .with_name_column("Name")
                .with_column(
                    ColumnConfig::new("Name")
                        .with_column("name")
                        .with_transformation("SNAKECASE"),
                ),
        )
        .unwrap();

        let ids = entity
            .insert_from_array(&bus, &[row([("Name", "Ben Waine")])], true)
            .unwrap();

        assert_eq!(entity.get_named_item_id("Ben Waine").unwrap(), ids[0]);
        assert!(!entity.has_named_item("ben_waine"));
        let stored = ds.get("attendee", ids[0]).unwrap().unwrap();
        assert_eq!(stored["name"], Value::text("ben_waine"));
    }

    #[test]
    fn test_name_found_under_storage_column() {
        let (ds, bus, entity) = setup();
        let ids = entity
            .insert_from_array(&bus, &[row([("name", "PHPNW"), ("venue", "Ramada Hotel")])], false)
            .unwrap();

        assert_eq!(entity.get_named_item_id("PHPNW").unwrap(), ids[0]);
        let stored = ds.get("event", ids[0]).unwrap().unwrap();
        assert_eq!(stored["name"], Value::text("PHPNW"));
    }

    #[test]
    fn test_unknown_name_is_record_not_found() {
        let (_, _, entity) = setup();
        let err = entity.get_named_item_id("PHPNE").unwrap_err();
        assert!(matches!(err, PhabricError::RecordNotFound { .. }));
    }

    #[test]
    fn test_rows_without_name_are_not_indexed() {
        let (ds, bus, entity) = setup();
        entity.insert_from_array(&bus, &[row([("Venue", "Nowhere")])], true).unwrap();
        assert_eq!(ds.count("event").unwrap(), 1);
        assert!(entity.named_items().is_empty());
    }

    #[test]
    fn test_update_by_name() {
        let (ds, bus, entity) = setup();
        let ids = entity.insert_from_table(&bus, &events(), true).unwrap();
        let update = DataTable::parse(
            "| Name  | Date             | Venue  |\n| PHPNW | 09/10/2011 10:30 | Hilton |",
        )
        .unwrap();
        entity.update_from_table(&bus, &update).unwrap();

        let stored = ds.get("event", ids[0]).unwrap().unwrap();
        assert_eq!(stored["venue"], Value::text("Hilton"));
        assert_eq!(stored["datetime"], Value::text("2011-10-09 10:30:00"));
        assert_eq!(stored["description"], Value::text("TBC"));
        assert_eq!(ds.count("event").unwrap(), 2);
    }

    #[test]
    fn test_update_unknown_name_writes_nothing() {
        let (ds, bus, entity) = setup();
        entity.insert_from_table(&bus, &events(), true).unwrap();
        let update = DataTable::parse(
            "| Name  | Venue  |\n| PHPNW | Hilton |\n| PHPNE | Leeds  |",
        )
        .unwrap();
        let err = entity.update_from_table(&bus, &update).unwrap_err();
        assert!(matches!(err, PhabricError::RecordNotFound { ref name, .. } if name == "PHPNE"));

        let first = ds.get("event", entity.get_named_item_id("PHPNW").unwrap()).unwrap().unwrap();
        assert_eq!(first["venue"], Value::text("Ramada Hotel"));
        assert_eq!(ds.count("event").unwrap(), 2);
    }

    #[test]
    fn test_update_requires_name_column() {
        let ds = Arc::new(MemoryDatasource::new());
        let bus = Phabric::new(ds);
        let entity = Entity::new("vote", EntityConfig::new("vote")).unwrap();
        let table = DataTable::parse("| vote |\n| 1 |").unwrap();
        let err = entity.update_from_table(&bus, &table).unwrap_err();
        assert!(matches!(err, PhabricError::InvalidArgument(_)));
    }

    #[test]
    fn test_upsert_mixes_update_and_insert() {
        let (ds, bus, entity) = setup();
        let ids = entity.insert_from_table(&bus, &events(), true).unwrap();
        let table = DataTable::parse(
            "| Name  | Venue  |\n| PHPUK | Excel  |\n| PHPNE | Leeds  |",
        )
        .unwrap();
        let upserted = entity.upsert_from_table(&bus, &table, true).unwrap();

        assert_eq!(upserted[0], ids[1]);
        assert_eq!(entity.get_named_item_id("PHPNE").unwrap(), upserted[1]);
        assert_eq!(ds.count("event").unwrap(), 3);
        let inserted = ds.get("event", upserted[1]).unwrap().unwrap();
        assert_eq!(inserted["description"], Value::text("TBC"));
    }

    #[test]
    fn test_datasource_errors_pass_through() {
        let (ds, bus, entity) = setup();
        ds.reject_writes("event", "unique(name)").unwrap();
        let err = entity.insert_from_table(&bus, &events(), true).unwrap_err();
        assert!(matches!(
            err,
            PhabricError::Datasource(DatasourceError::Constraint { .. })
        ));
        assert!(entity.named_items().is_empty());
    }

    #[test]
    fn test_clear_forgets_names() {
        let (_, bus, entity) = setup();
        entity.insert_from_table(&bus, &events(), true).unwrap();
        entity.clear();
        assert!(!entity.has_named_item("PHPNW"));
    }

    #[test]
    fn test_missing_transformation_is_not_found() {
        let ds = Arc::new(MemoryDatasource::new());
        let bus = Phabric::new(ds.clone());
        let entity = Entity::new("event", event_config()).unwrap();
        let err = entity.insert_from_table(&bus, &events(), true).unwrap_err();
        assert!(matches!(err, PhabricError::NotFound { .. }));
        assert_eq!(ds.count("event").unwrap(), 0);
    }
}
