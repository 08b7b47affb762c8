// src/core/context.rs

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::core::parser::ParseResult;
use crate::core::services::Services;
use crate::models::{CommandId, Parameter, Token, Value};

/// Where response text for an execution goes: a console, a chat channel, a player.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, text: &str) -> anyhow::Result<()>;
}

/// Outcome of asking the surrounding context for an argument nobody typed.
pub enum MissingValue {
    /// Use the parameter's default, or leave the argument missing.
    Missing,
    /// Use this value instead. It must be exactly the parameter's type.
    Value(Value),
}

pub trait MissingValueProvider: Send + Sync {
    fn resolve(&self, context: &CommandContext, parameter: &Parameter) -> MissingValue;
}

/// Raw input of one execution.
#[derive(Debug, Clone)]
pub enum Input {
    Text(String),
    Tokens(Vec<Token>),
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<Vec<Token>> for Input {
    fn from(tokens: Vec<Token>) -> Self {
        Input::Tokens(tokens)
    }
}

/// Cooperative cancellation signal. Command bodies may observe it; the
/// dispatcher never aborts work on its own.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Completes once [`Cancellation::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Per-execution state. Built by the host, filled in by the dispatcher as the
/// pipeline advances, never shared between executions.
pub struct CommandContext {
    id: Uuid,
    input: Input,
    responder: Option<Arc<dyn Responder>>,
    missing_values: Option<Arc<dyn MissingValueProvider>>,
    extensions: Services,
    cancellation: Cancellation,
    pub(crate) parsed: Option<ParseResult>,
    pub(crate) command: Option<CommandId>,
}

impl CommandContext {
    pub fn new(input: impl Into<Input>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: input.into(),
            responder: None,
            missing_values: None,
            extensions: Services::new(),
            cancellation: Cancellation::new(),
            parsed: None,
            command: None,
        }
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_missing_values(mut self, provider: Arc<dyn MissingValueProvider>) -> Self {
        self.missing_values = Some(provider);
        self
    }

    /// Attaches typed host data (the calling user, a channel handle) for
    /// preconditions and handlers to read.
    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.extensions.insert(extension);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn parsed(&self) -> Option<&ParseResult> {
        self.parsed.as_ref()
    }

    /// The command name as typed, once parsing has run.
    pub fn command_name(&self) -> Option<&str> {
        self.parsed.as_ref().map(|p| p.name.as_str())
    }

    /// The command selected for execution, once Check and Read passed.
    pub fn command(&self) -> Option<CommandId> {
        self.command
    }

    pub fn positional(&self) -> &[Token] {
        self.parsed
            .as_ref()
            .map(|p| p.positional.as_slice())
            .unwrap_or_default()
    }

    pub fn named(&self) -> Option<&HashMap<String, Option<String>>> {
        self.parsed.as_ref().map(|p| &p.named)
    }

    /// True when the flag was given, with or without a value.
    pub fn flag(&self, name: &str) -> bool {
        self.named()
            .map(|named| named.keys().any(|key| key.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
    }

    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.extensions.get::<T>()
    }

    pub fn missing_values(&self) -> Option<&Arc<dyn MissingValueProvider>> {
        self.missing_values.as_ref()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn has_responder(&self) -> bool {
        self.responder.is_some()
    }

    /// Sends text through the responder. Without one the text is only logged.
    pub async fn reply(&self, text: &str) -> anyhow::Result<()> {
        match &self.responder {
            Some(responder) => responder.respond(text).await,
            None => {
                log::debug!("[{}] No responder attached; dropping reply: {}", self.id, text);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("parsed", &self.parsed)
            .field("command", &self.command)
            .finish()
    }
}
