// src/models/parameter.rs

use std::fmt;
use std::sync::Arc;

use crate::models::value::{Arguments, Value, ValueType};
use crate::readers::TypeReader;

/// Builds an instance of a complex parameter's type from its resolved children.
pub type ValueFactory = Arc<dyn Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync>;

/// One formal parameter of a command or of a complex parameter's constructor.
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub value_type: ValueType,
    pub description: Option<String>,
    pub optional: bool,
    pub nullable: bool,
    pub remainder: bool,
    pub default: Option<Value>,
    /// Names under which the parameter is bound from named arguments. Empty for
    /// positional parameters.
    pub names: Vec<String>,
    /// Reader used instead of the registry entry for `value_type`.
    pub reader: Option<Arc<dyn TypeReader>>,
    pub kind: ParameterKind,
}

#[derive(Clone)]
pub enum ParameterKind {
    Leaf,
    Complex(ComplexParameter),
}

#[derive(Clone)]
pub struct ComplexParameter {
    pub parameters: Vec<Parameter>,
    pub constructor: ValueFactory,
    min_length: usize,
    max_length: usize,
}

impl ComplexParameter {
    pub fn new(parameters: Vec<Parameter>, constructor: ValueFactory) -> Self {
        let min_length = parameters.iter().map(Parameter::min_length).sum();
        let max_length = parameters
            .iter()
            .map(Parameter::max_length)
            .fold(0usize, usize::saturating_add);
        Self {
            parameters,
            constructor,
            min_length,
            max_length,
        }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Parameter {
    pub fn is_named(&self) -> bool {
        !self.names.is_empty()
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.kind, ParameterKind::Complex(_))
    }

    /// Fewest positional tokens this parameter consumes.
    pub fn min_length(&self) -> usize {
        if self.is_named() || self.optional || self.nullable {
            return 0;
        }
        match &self.kind {
            ParameterKind::Leaf => 1,
            ParameterKind::Complex(complex) => complex.min_length(),
        }
    }

    /// Most positional tokens this parameter consumes; `usize::MAX` for a remainder.
    pub fn max_length(&self) -> usize {
        if self.is_named() {
            return 0;
        }
        if self.remainder {
            return usize::MAX;
        }
        match &self.kind {
            ParameterKind::Leaf => 1,
            ParameterKind::Complex(complex) => complex.max_length(),
        }
    }

    /// Usage fragment: `<name>`, `[name]`, `<name...>`, `--name <Type>` or `<name: x y>`.
    pub fn signature(&self) -> String {
        if self.is_named() {
            let flag = if self.names[0].chars().count() == 1 {
                format!("-{}", self.names[0])
            } else {
                format!("--{}", self.names[0])
            };
            return if self.value_type.is::<bool>() {
                format!("[{}]", flag)
            } else {
                format!("[{}: <{}>]", flag, self.value_type)
            };
        }
        let inner = match &self.kind {
            ParameterKind::Leaf if self.remainder => format!("{}...", self.name),
            ParameterKind::Leaf => self.name.clone(),
            ParameterKind::Complex(complex) => {
                let children: Vec<String> =
                    complex.parameters.iter().map(Parameter::signature).collect();
                format!("{}: {}", self.name, children.join(" "))
            }
        };
        if self.optional || self.nullable {
            format!("[{}]", inner)
        } else {
            format!("<{}>", inner)
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("optional", &self.optional)
            .field("nullable", &self.nullable)
            .field("remainder", &self.remainder)
            .field("names", &self.names)
            .field("complex", &self.is_complex())
            .finish()
    }
}
