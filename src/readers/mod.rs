// src/readers/mod.rs

//! Conversion of raw string tokens into typed argument values.
//!
//! A [`TypeReaderRegistry`] maps a target type to the [`TypeReader`] that
//! produces it. The registry is filled at startup and read concurrently by every
//! execution; the last registration for a type wins.

pub mod color;
pub mod primitives;
pub mod time;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::context::CommandContext;
use crate::models::{Parameter, Value, ValueType};

pub use color::Color;

/// Converts one raw token into a value of [`TypeReader::target`].
///
/// Failures return only the reason; the caller adds the parameter name, the
/// expected type and the raw text to the final message.
#[async_trait]
pub trait TypeReader: Send + Sync {
    fn target(&self) -> ValueType;

    async fn read(
        &self,
        context: &CommandContext,
        parameter: &Parameter,
        raw: &str,
    ) -> Result<Value, String>;
}

/// Adapts a plain parsing function into a [`TypeReader`].
pub struct FnReader<T, F> {
    parse: F,
    _target: PhantomData<fn() -> T>,
}

impl<T, F> FnReader<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&str) -> Result<T, String> + Send + Sync,
{
    pub fn new(parse: F) -> Self {
        Self {
            parse,
            _target: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> TypeReader for FnReader<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&str) -> Result<T, String> + Send + Sync,
{
    fn target(&self) -> ValueType {
        ValueType::of::<T>()
    }

    async fn read(
        &self,
        _context: &CommandContext,
        _parameter: &Parameter,
        raw: &str,
    ) -> Result<Value, String> {
        (self.parse)(raw).map(|parsed| Arc::new(parsed) as Value)
    }
}

#[derive(Default)]
pub struct TypeReaderRegistry {
    readers: RwLock<HashMap<TypeId, Arc<dyn TypeReader>>>,
}

impl TypeReaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.install_defaults();
        registry
    }

    /// Registers the built-in readers. Readers registered earlier for the same
    /// types are replaced.
    pub fn install_defaults(&self) {
        primitives::install(self);
        time::install(self);
        self.register(FnReader::new(Color::parse));
        log::debug!("Default type readers installed ({} types).", self.len());
    }

    pub fn register<R: TypeReader + 'static>(&self, reader: R) {
        self.register_shared(Arc::new(reader));
    }

    pub fn register_shared(&self, reader: Arc<dyn TypeReader>) {
        let target = reader.target();
        if self.readers.write().insert(target.id(), reader).is_some() {
            log::debug!("Type reader for '{}' replaced.", target);
        }
    }

    pub fn register_fn<T, F>(&self, parse: F)
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.register(FnReader::new(parse));
    }

    pub fn get(&self, target: TypeId) -> Option<Arc<dyn TypeReader>> {
        self.readers.read().get(&target).cloned()
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.readers.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.readers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParameterKind;

    fn parameter<T: Any>() -> Parameter {
        Parameter {
            name: "value".to_string(),
            value_type: ValueType::of::<T>(),
            description: None,
            optional: false,
            nullable: false,
            remainder: false,
            default: None,
            names: Vec::new(),
            reader: None,
            kind: ParameterKind::Leaf,
        }
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = TypeReaderRegistry::new();
        registry.register_fn(|_| Ok(1_i32));
        registry.install_defaults();
        registry.register_fn(|_| Ok(99_i32));

        let reader = registry.get(TypeId::of::<i32>()).unwrap();
        let context = CommandContext::new("x");
        let read = reader.read(&context, &parameter::<i32>(), "5").await.unwrap();
        assert_eq!(read.downcast_ref::<i32>(), Some(&99));
    }

    #[test]
    fn defaults_cover_scalars_and_leaf_types() {
        let registry = TypeReaderRegistry::with_defaults();
        assert!(registry.contains::<i64>());
        assert!(registry.contains::<bool>());
        assert!(registry.contains::<String>());
        assert!(registry.contains::<std::time::Duration>());
        assert!(registry.contains::<chrono::DateTime<chrono::Utc>>());
        assert!(registry.contains::<Color>());
    }
}
