//! Data transformations
//!
//! A transformation converts a raw scenario value into the value stored in
//! the datasource: reformatting dates, mapping labels to integers, or
//! resolving the name of a row inserted earlier to its primary key.

pub mod builtin;
mod catalog;

pub use catalog::{BusFn, Transformation, TransformationCatalog, ValueFn};
