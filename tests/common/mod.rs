//! Shared setup for the conference scenarios
//!
//! A small conference schema (events, attendees, sessions and votes) in an
//! in-memory SQLite database, with a bus configured the way a feature
//! context would configure it.

#![allow(dead_code)]

use phabric::{builtin, OpenDatasource, Phabric, PhabricConfig, SqliteDatasource};
use std::sync::Arc;

pub const SCHEMA: &str = r#"
CREATE TABLE event (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    datetime TEXT,
    venue TEXT,
    description TEXT
);

CREATE TABLE attendee (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    twitter TEXT
);

CREATE TABLE session (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_code TEXT NOT NULL,
    name TEXT,
    description TEXT
);

CREATE TABLE vote (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES session(id),
    attendee_id INTEGER NOT NULL REFERENCES attendee(id),
    vote INTEGER NOT NULL
);
"#;

pub const CONFIG: &str = r#"
lookups:
  ATTENDEELOOKUP: attendee
  SESSIONLOOKUP: session
entities:
  event:
    table: event
    name_column: Name
    columns:
      - { name: Name, column: name }
      - { name: Date, column: datetime, transformation: UKTOMYSQLDATE }
      - { name: Venue, column: venue }
      - { name: Desc, column: description, default: "No description" }
  attendee:
    table: attendee
    name_column: Name
    columns:
      - { name: Name, column: name }
      - { name: Twitter, column: twitter }
  session:
    table: session
    name_column: Session Code
    columns:
      - { name: Session Code, column: session_code }
      - { name: Name, column: name }
      - { name: Description, column: description }
  vote:
    table: vote
    columns:
      - { name: Attendee, column: attendee_id, transformation: ATTENDEELOOKUP }
      - { name: Session, column: session_id, transformation: SESSIONLOOKUP }
      - { name: Vote, column: vote, transformation: UPDOWNTOINT }
"#;

/// A bus over a fresh in-memory conference database
pub fn conference() -> (Arc<SqliteDatasource>, Phabric) {
    let ds = SqliteDatasource::open_in_memory().expect("open in-memory database");
    ds.execute_batch(SCHEMA).expect("create schema");
    let ds = Arc::new(ds);

    let config = PhabricConfig::from_yaml_str(CONFIG).expect("parse configuration");
    let mut bus = Phabric::from_config(ds.clone(), &config).expect("build bus");
    bus.add_data_transformation("UKTOMYSQLDATE", builtin::uk_to_sql_date())
        .expect("register date transformation");
    bus.add_data_transformation("UPDOWNTOINT", builtin::up_down_to_int())
        .expect("register vote transformation");
    bus.add_data_transformation("SNAKECASE", builtin::snake_case())
        .expect("register snake case transformation");

    (ds, bus)
}

/// Parse a table written inline in a test
pub fn table(text: &str) -> phabric::DataTable {
    phabric::DataTable::parse(text).expect("parse table")
}
