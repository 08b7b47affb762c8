// src/core/preconditions.rs

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::core::context::CommandContext;
use crate::core::dispatcher::panic_message;
use crate::models::{Command, ModuleId};

/// Why a precondition refused to let a command run.
#[derive(Debug, Clone)]
pub struct PreconditionError {
    pub message: String,
    pub source: Option<Arc<anyhow::Error>>,
}

impl PreconditionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn from_error(error: anyhow::Error) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }
    }
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A gate evaluated before any argument is converted.
#[async_trait]
pub trait Precondition: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn check(
        &self,
        context: &CommandContext,
        command: &Command,
    ) -> Result<(), PreconditionError>;
}

type Predicate = Box<dyn Fn(&CommandContext, &Command) -> Result<(), String> + Send + Sync>;

/// A synchronous check written as a closure.
pub struct PredicatePrecondition {
    name: String,
    predicate: Predicate,
}

impl PredicatePrecondition {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&CommandContext, &Command) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

#[async_trait]
impl Precondition for PredicatePrecondition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(
        &self,
        context: &CommandContext,
        command: &Command,
    ) -> Result<(), PreconditionError> {
        (self.predicate)(context, command).map_err(PreconditionError::new)
    }
}

/// Passes only when the host attached an extension of type `T` to the context.
pub struct RequireExtension<T> {
    message: String,
    _extension: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> RequireExtension<T> {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            _extension: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Any + Send + Sync> Precondition for RequireExtension<T> {
    fn name(&self) -> &str {
        "RequireExtension"
    }

    async fn check(
        &self,
        context: &CommandContext,
        _command: &Command,
    ) -> Result<(), PreconditionError> {
        match context.extension::<T>() {
            Some(_) => Ok(()),
            None => Err(PreconditionError::new(self.message.clone())),
        }
    }
}

/// The precondition that failed and what it reported.
#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub precondition: String,
    pub error: PreconditionError,
}

/// Outcomes of inherited (module-level) preconditions, kept for one execution.
#[derive(Default)]
pub struct PreconditionCache {
    modules: HashMap<ModuleId, Result<(), CheckFailure>>,
}

impl PreconditionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs every precondition of `command` in order; the first failure stops the run.
pub async fn run_preconditions(
    context: &CommandContext,
    command: &Command,
    cache: &mut PreconditionCache,
) -> Result<(), CheckFailure> {
    let inherited = match cache.modules.get(&command.module) {
        Some(outcome) => outcome.clone(),
        None => {
            let outcome = evaluate(context, command, command.inherited_preconditions()).await;
            cache.modules.insert(command.module, outcome.clone());
            outcome
        }
    };
    inherited?;
    evaluate(context, command, command.own_preconditions()).await
}

async fn evaluate(
    context: &CommandContext,
    command: &Command,
    preconditions: &[Arc<dyn Precondition>],
) -> Result<(), CheckFailure> {
    for precondition in preconditions {
        let outcome = AssertUnwindSafe(precondition.check(context, command))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(PreconditionError::new(format!(
                    "Precondition '{}' panicked: {}",
                    precondition.name(),
                    panic_message(&*panic)
                )))
            });
        if let Err(error) = outcome {
            log::debug!(
                "[{}] Precondition '{}' refused '{}': {}",
                context.id(),
                precondition.name(),
                command.name,
                error
            );
            return Err(CheckFailure {
                precondition: precondition.name().to_string(),
                error,
            });
        }
    }
    Ok(())
}
