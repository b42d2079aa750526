//! The Phabric bus and its error type

mod engine;


pub use engine::{Phabric, PhabricError, PhabricResult, UpdateOutcome};
