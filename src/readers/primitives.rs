// src/readers/primitives.rs

use std::any::Any;
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use super::{FnReader, TypeReader, TypeReaderRegistry};
use crate::core::context::CommandContext;
use crate::models::{Parameter, Value, ValueType};

/// Reads any type whose `FromStr` implementation accepts the trimmed token.
pub struct FromStrReader<T>(PhantomData<fn() -> T>);

impl<T> FromStrReader<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FromStrReader<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> TypeReader for FromStrReader<T>
where
    T: FromStr + Any + Send + Sync,
    T::Err: Display,
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
        raw.trim()
            .parse::<T>()
            .map(|parsed| Arc::new(parsed) as Value)
            .map_err(|e| e.to_string())
    }
}

pub fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "no" | "n" | "off" | "0" => Ok(false),
        _ => Err("expected true/false, yes/no, on/off or 1/0".to_string()),
    }
}

pub(crate) fn install(registry: &TypeReaderRegistry) {
    registry.register(FromStrReader::<i8>::new());
    registry.register(FromStrReader::<i16>::new());
    registry.register(FromStrReader::<i32>::new());
    registry.register(FromStrReader::<i64>::new());
    registry.register(FromStrReader::<i128>::new());
    registry.register(FromStrReader::<isize>::new());
    registry.register(FromStrReader::<u8>::new());
    registry.register(FromStrReader::<u16>::new());
    registry.register(FromStrReader::<u32>::new());
    registry.register(FromStrReader::<u64>::new());
    registry.register(FromStrReader::<u128>::new());
    registry.register(FromStrReader::<usize>::new());
    registry.register(FromStrReader::<f32>::new());
    registry.register(FromStrReader::<f64>::new());
    registry.register(FromStrReader::<char>::new());
    registry.register(FnReader::new(|raw: &str| Ok(raw.to_string())));
    registry.register(FnReader::new(parse_bool));
}
