//! Ready-made transformations
//!
//! None of these are registered automatically; callers pick a name and add
//! them to the bus, e.g. `bus.add_data_transformation("UKTOMYSQLDATE", uk_to_sql_date())`.

use super::catalog::Transformation;
use crate::bus::{PhabricError, PhabricResult};
use crate::value::Value;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Input format of `uk_to_sql_date`
pub const UK_DATETIME: &str = "%d/%m/%Y %H:%M";

/// Output format of `uk_to_sql_date`
pub const SQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Reformat a date-time string from one chrono format to another
///
/// `Null` passes through; anything that does not parse is an error.
pub fn date_format(from: &str, to: &str) -> Transformation {
    let from = from.to_string();
    let to = to.to_string();
    Transformation::new(move |value| {
        let Some(raw) = text_or_null(value, "date_format")? else {
            return Ok(Value::Null);
        };
        let parsed = NaiveDateTime::parse_from_str(raw.trim(), &from).map_err(|e| {
            PhabricError::Transformation {
                name: "date_format".to_string(),
                message: format!("'{}' does not match '{}': {}", raw, from, e),
            }
        })?;
        Ok(Value::Text(parsed.format(&to).to_string()))
    })
}

/// `28/10/2011 09:00` to `2011-10-28 09:00:00`
pub fn uk_to_sql_date() -> Transformation {
    date_format(UK_DATETIME, SQL_DATETIME)
}

/// Map labels to integers, ignoring case and surrounding whitespace
///
/// A label missing from the table is an error rather than a silent null.
pub fn enum_to_int<I, S>(pairs: I) -> Transformation
where
    I: IntoIterator<Item = (S, i64)>,
    S: AsRef<str>,
{
    let table: HashMap<String, i64> = pairs
        .into_iter()
        .map(|(label, n)| (label.as_ref().trim().to_uppercase(), n))
        .collect();
    Transformation::new(move |value| {
        let Some(raw) = text_or_null(value, "enum_to_int")? else {
            return Ok(Value::Null);
        };
        table
            .get(&raw.trim().to_uppercase())
            .map(|n| Value::Int(*n))
            .ok_or_else(|| PhabricError::Transformation {
                name: "enum_to_int".to_string(),
                message: format!("unknown label '{}'", raw),
            })
    })
}

/// Vote labels: `UP` = 1, `DOWN` = -1, `NO VOTE` = 0
pub fn up_down_to_int() -> Transformation {
    enum_to_int([("UP", 1), ("DOWN", -1), ("NO VOTE", 0)])
}

/// Lowercase and replace spaces with underscores
pub fn snake_case() -> Transformation {
    Transformation::new(|value| {
        let Some(raw) = text_or_null(value, "snake_case")? else {
            return Ok(Value::Null);
        };
        Ok(Value::Text(raw.to_lowercase().replace(' ', "_")))
    })
}

/// Resolve a name to the id another entity recorded for it
pub fn lookup(entity: impl Into<String>) -> Transformation {
    let entity = entity.into();
    Transformation::with_bus(move |value, bus| {
        let Some(name) = text_or_null(value, "lookup")? else {
            return Ok(Value::Null);
        };
        let id = bus.get_entity(&entity)?.get_named_item_id(name)?;
        Ok(Value::from(id))
    })
}

fn text_or_null<'a>(value: &'a Value, name: &str) -> PhabricResult<Option<&'a str>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(PhabricError::Transformation {
            name: name.to_string(),
            message: format!("expected text, got {}", other.kind()),
        }),
    }
}
