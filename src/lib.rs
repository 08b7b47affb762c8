// src/lib.rs

//! parley: a text-command dispatch framework.
//!
//! Commands are declared in modules with [`ModuleBuilder`] and
//! [`CommandBuilder`], collected into a [`CommandService`], and run with
//! [`CommandService::execute`]:
//!
//! ```no_run
//! use parley::{CommandBuilder, CommandContext, CommandModule, CommandService, ModuleBuilder};
//!
//! #[derive(Default)]
//! struct Ping;
//! impl CommandModule for Ping {}
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let service = CommandService::builder()
//!     .module(
//!         ModuleBuilder::<Ping>::new("ping")
//!             .default_constructor()
//!             .command(CommandBuilder::new("ping").sync_handler(|_, _, _| Ok("pong".into()))),
//!     )
//!     .build()?;
//! let result = service.execute(&mut CommandContext::new("ping")).await;
//! assert_eq!(result?.output.text(), Some("pong"));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod models;
pub mod readers;
pub mod system;

pub use crate::config::{DispatchConfig, ReadFailurePolicy};
pub use crate::core::arguments::ReadError;
pub use crate::core::builder::{
    BuildError, CommandBuilder, ComplexConstructor, ModuleBuilder, ParameterDescriptor,
};
pub use crate::core::context::{
    Cancellation, CommandContext, Input, MissingValue, MissingValueProvider, Responder,
};
pub use crate::core::dispatcher::{CommandService, DefaultHooks, DispatchHooks};
pub use crate::core::preconditions::{
    Precondition, PreconditionError, PredicatePrecondition, RequireExtension,
};
pub use crate::core::results::{CommandSuccess, DispatchError, ExecutionResult, Stage};
pub use crate::core::services::Services;
pub use crate::models::{
    Arguments, Command, CommandModule, CommandOutput, ModuleConstructor, Token, Value, ValueType,
};
pub use crate::readers::{Color, TypeReader, TypeReaderRegistry};
