// src/core/results.rs

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::arguments::ReadError;
use crate::core::parser::ParseError;
use crate::core::preconditions::CheckFailure;
use crate::core::search::SearchError;
use crate::models::{CommandId, CommandOutput};

/// Pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Parse,
    Search,
    Check,
    Read,
    Construction,
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Search => "search",
            Stage::Check => "check",
            Stage::Read => "read",
            Stage::Construction => "construction",
            Stage::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// The stage that ended an execution and why.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("{}", .failure.error)]
    Check { command: String, failure: CheckFailure },
    #[error("{error}")]
    Read {
        command: String,
        #[source]
        error: ReadError,
    },
    #[error("Could not create the handler for '{command}': {message}")]
    Construction {
        command: String,
        message: String,
        error: Option<Arc<anyhow::Error>>,
    },
    #[error("'{command}' failed: {message}")]
    Execute {
        command: String,
        message: String,
        error: Option<Arc<anyhow::Error>>,
    },
}

impl DispatchError {
    pub(crate) fn construction(command: &str, error: anyhow::Error) -> Self {
        DispatchError::Construction {
            command: command.to_string(),
            message: error.to_string(),
            error: Some(Arc::new(error)),
        }
    }

    pub(crate) fn execute(command: &str, error: anyhow::Error) -> Self {
        DispatchError::Execute {
            command: command.to_string(),
            message: format!("{:#}", error),
            error: Some(Arc::new(error)),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            DispatchError::Parse(_) => Stage::Parse,
            DispatchError::Search(_) => Stage::Search,
            DispatchError::Check { .. } => Stage::Check,
            DispatchError::Read { .. } => Stage::Read,
            DispatchError::Construction { .. } => Stage::Construction,
            DispatchError::Execute { .. } => Stage::Execute,
        }
    }

    /// Qualified name of the command involved, from the Check stage on.
    pub fn command(&self) -> Option<&str> {
        match self {
            DispatchError::Parse(_) | DispatchError::Search(_) => None,
            DispatchError::Check { command, .. }
            | DispatchError::Read { command, .. }
            | DispatchError::Construction { command, .. }
            | DispatchError::Execute { command, .. } => Some(command),
        }
    }

    /// The error raised by host code (a precondition, constructor, hook or body), if any.
    pub fn error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            DispatchError::Check { failure, .. } => failure.error.source.as_ref(),
            DispatchError::Construction { error, .. } | DispatchError::Execute { error, .. } => {
                error.as_ref()
            }
            DispatchError::Read {
                error: ReadError::Construction { error, .. },
                ..
            } => error.as_ref(),
            _ => None,
        }
    }
}

/// A command ran to completion.
#[derive(Debug, Clone)]
pub struct CommandSuccess {
    pub command: CommandId,
    /// Group names and command name, e.g. `math add`.
    pub name: String,
    pub output: CommandOutput,
    /// Recoverable issues met on the way, such as an optional service that was absent.
    pub notices: Vec<String>,
}

pub type ExecutionResult = Result<CommandSuccess, DispatchError>;
