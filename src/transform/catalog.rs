//! Transformation catalog: named functions applied to cell values

use crate::bus::{Phabric, PhabricError, PhabricResult};
use crate::registry::{Registry, DATA_TRANSFORMATIONS};
use crate::value::Value;
use std::sync::Arc;

/// Signature of a transformation that only needs the raw value
pub type ValueFn = dyn Fn(&Value) -> PhabricResult<Value> + Send + Sync;

/// Signature of a transformation that also reads other entities through the bus
pub type BusFn = dyn Fn(&Value, &Phabric) -> PhabricResult<Value> + Send + Sync;

/// A registered data transformation
///
/// Transformations are pure apart from lookup reads through the bus handle.
#[derive(Clone)]
pub enum Transformation {
    Value(Arc<ValueFn>),
    WithBus(Arc<BusFn>),
}

impl Transformation {
    /// Wrap a function of the raw value
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> PhabricResult<Value> + Send + Sync + 'static,
    {
        Self::Value(Arc::new(f))
    }

    /// Wrap a function of the raw value and the bus
    pub fn with_bus<F>(f: F) -> Self
    where
        F: Fn(&Value, &Phabric) -> PhabricResult<Value> + Send + Sync + 'static,
    {
        Self::WithBus(Arc::new(f))
    }

    pub fn apply(&self, value: &Value, bus: &Phabric) -> PhabricResult<Value> {
        match self {
            Self::Value(f) => f(value),
            Self::WithBus(f) => f(value, bus),
        }
    }

    /// Whether the function takes the bus handle
    pub fn needs_bus(&self) -> bool {
        matches!(self, Self::WithBus(_))
    }
}

impl std::fmt::Debug for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Transformation::Value(..)"),
            Self::WithBus(_) => f.write_str("Transformation::WithBus(..)"),
        }
    }
}

/// Named transformations, looked up case-insensitively
#[derive(Debug, Clone)]
pub struct TransformationCatalog {
    registry: Registry<Transformation>,
}

impl TransformationCatalog {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(DATA_TRANSFORMATIONS),
        }
    }

    /// Register a transformation, replacing any with the same name
    pub fn register(&mut self, name: &str, transformation: Transformation) -> PhabricResult<()> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(PhabricError::InvalidArgument(
                "transformation name must not be empty".to_string(),
            ));
        }
        tracing::debug!(name = %key, needs_bus = transformation.needs_bus(), "registered transformation");
        self.registry.add(key, transformation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> PhabricResult<&Transformation> {
        self.registry.get(&normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(&normalize(name))
    }

    /// Look up `name` and apply it to `value`
    pub fn apply(&self, name: &str, value: &Value, bus: &Phabric) -> PhabricResult<Value> {
        self.get(name)?.apply(value, bus)
    }

    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl Default for TransformationCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}
