//! Entities: per-table fixture controllers

mod config;
mod controller;

pub use config::{ColumnConfig, EntityConfig};
pub use controller::Entity;
