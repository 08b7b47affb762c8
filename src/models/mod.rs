// src/models/mod.rs

pub mod component;
pub mod parameter;
pub mod value;

pub use component::{
    Command, CommandFuture, CommandId, CommandModule, CommandOutput, CommandTree, Component,
    Dependencies, Dependency, Module, ModuleConstructor, ModuleId, ReturnKind,
};
pub use parameter::{ComplexParameter, Parameter, ParameterKind, ValueFactory};
pub use value::{Argument, Arguments, Token, Value, ValueType, value};
