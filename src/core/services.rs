// src/core/services.rs

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Value, ValueType};

/// A container of shared services keyed by type, used to satisfy module
/// constructor dependencies and to carry per-execution context extensions.
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<TypeId, Value>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service`, replacing any earlier service of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        self.entries.insert(TypeId::of::<T>(), Arc::new(service));
        self
    }

    pub fn insert_shared<T: Any + Send + Sync>(&mut self, service: Arc<T>) -> &mut Self {
        self.entries.insert(TypeId::of::<T>(), service);
        self
    }

    pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.insert(service);
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    pub fn resolve(&self, service: &ValueType) -> Option<Value> {
        self.entries.get(&service.id()).cloned()
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("entries", &self.entries.len())
            .finish()
    }
}
