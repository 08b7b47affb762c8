// src/models/value.rs

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased value flowing between the pipeline stages.
///
/// Values are shared rather than boxed so that a token can be offered to several
/// overload candidates without being consumed by the first one.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wraps a concrete value into a [`Value`].
pub fn value<T: Any + Send + Sync>(inner: T) -> Value {
    Arc::new(inner)
}

/// Runtime identity of a parameter or service type.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, as reported by the compiler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name with module paths stripped, e.g. `DateTime<Utc>`.
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        let mut chars = self.name.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                ':' if chars.peek() == Some(&':') => {
                    chars.next();
                    segment.clear();
                }
                c if c.is_alphanumeric() || c == '_' => segment.push(c),
                other => {
                    out.push_str(&segment);
                    segment.clear();
                    out.push(other);
                }
            }
        }
        out.push_str(&segment);
        out
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// True when `value` holds exactly this type.
    pub fn matches(&self, value: &Value) -> bool {
        type_of(value) == self.id
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// `TypeId` of the concrete value behind the `Arc`, not of the `Arc` itself.
pub(crate) fn type_of(value: &Value) -> TypeId {
    (**value).type_id()
}

/// A single positional token, either raw text or a value the host already typed.
#[derive(Clone)]
pub enum Token {
    Text(String),
    Typed(Value),
}

impl Token {
    pub fn typed<T: Any + Send + Sync>(inner: T) -> Self {
        Token::Typed(value(inner))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Token::Text(text) => Some(text),
            Token::Typed(_) => None,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(text) => write!(f, "{:?}", text),
            Token::Typed(_) => f.write_str("<typed value>"),
        }
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Token::Text(text.to_string())
    }
}

impl From<String> for Token {
    fn from(text: String) -> Self {
        Token::Text(text)
    }
}

/// One resolved argument: a value, or the "missing" marker for optional parameters
/// that received nothing and declare no default.
#[derive(Clone)]
pub enum Argument {
    Value(Value),
    Missing,
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(_) => f.write_str("Value(..)"),
            Argument::Missing => f.write_str("Missing"),
        }
    }
}

/// The resolved argument list handed to a command handler or a complex-parameter constructor.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Vec<Argument>,
}

impl Arguments {
    pub fn new(values: Vec<Argument>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Argument> {
        self.values.get(index)
    }

    pub fn is_missing(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(Argument::Missing) | None)
    }

    /// Borrows argument `index` as `T`; `None` when missing or of another type.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        match self.values.get(index) {
            Some(Argument::Value(v)) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn cloned<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.get::<T>(index).cloned()
    }

    /// Like [`Arguments::cloned`] but reports which argument was absent.
    pub fn require<T: Any + Clone>(&self, index: usize) -> anyhow::Result<T> {
        self.cloned::<T>(index).ok_or_else(|| {
            anyhow::anyhow!(
                "argument {} is missing or is not a '{}'",
                index,
                ValueType::of::<T>()
            )
        })
    }

    pub fn into_values(self) -> Vec<Argument> {
        self.values
    }
}
