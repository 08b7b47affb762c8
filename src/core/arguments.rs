// src/core/arguments.rs

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::constants::NULL_LITERAL;
use crate::core::context::{CommandContext, MissingValue};
use crate::core::dispatcher::panic_message;
use crate::models::{Argument, Arguments, Command, Parameter, ParameterKind, Token, Value};
use crate::readers::TypeReaderRegistry;

#[derive(Error, Debug, Clone)]
pub enum ReadError {
    #[error("'{command}' takes {} argument(s) but {given} were given.", describe_range(.min, .max))]
    ArgumentCount {
        command: String,
        min: usize,
        max: usize,
        given: usize,
    },
    #[error("Could not read '{raw}' as {expected} for '{parameter}': {reason}")]
    Conversion {
        parameter: String,
        expected: String,
        raw: String,
        reason: String,
    },
    #[error("No type reader is registered for {expected} (parameter '{parameter}').")]
    NoReader { parameter: String, expected: String },
    #[error("Missing value for required parameter '{parameter}'.")]
    Missing { parameter: String },
    #[error("The value given for '{parameter}' is not a {expected}.")]
    TypeMismatch { parameter: String, expected: String },
    #[error("Could not build '{parameter}': {message}")]
    Construction {
        parameter: String,
        message: String,
        error: Option<Arc<anyhow::Error>>,
    },
}

fn describe_range(min: &usize, max: &usize) -> String {
    match (*min, *max) {
        (min, usize::MAX) => format!("at least {}", min),
        (min, max) if min == max => min.to_string(),
        (min, max) => format!("{} to {}", min, max),
    }
}

type ReadResult<T> = Result<T, ReadError>;

/// Rejects candidates whose positional bounds cannot fit `given` tokens.
/// Error overloads accept any count.
pub fn check_length(command: &Command, given: usize) -> ReadResult<()> {
    if command.error_overload || (command.min_length()..=command.max_length()).contains(&given) {
        return Ok(());
    }
    Err(ReadError::ArgumentCount {
        command: command.name.clone(),
        min: command.min_length(),
        max: command.max_length(),
        given,
    })
}

/// Converts the tokens of one execution into a command's argument list.
pub struct ArgumentResolver<'a> {
    readers: &'a TypeReaderRegistry,
    context: &'a CommandContext,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(readers: &'a TypeReaderRegistry, context: &'a CommandContext) -> Self {
        Self { readers, context }
    }

    pub async fn resolve(
        &self,
        command: &Command,
        positional: &[Token],
        named: &HashMap<String, Option<String>>,
    ) -> ReadResult<Arguments> {
        let mut cursor = 0;
        let mut values = Vec::with_capacity(command.parameters.len());
        for parameter in &command.parameters {
            let argument = if parameter.is_named() {
                self.resolve_named(parameter, named).await?
            } else {
                self.resolve_positional(parameter, positional, &mut cursor).await?
            };
            values.push(argument);
        }
        if cursor < positional.len() {
            log::debug!(
                "[{}] '{}' ignored {} surplus token(s).",
                self.context.id(),
                command.name,
                positional.len() - cursor
            );
        }
        Ok(Arguments::new(values))
    }

    fn resolve_positional<'r>(
        &'r self,
        parameter: &'r Parameter,
        tokens: &'r [Token],
        cursor: &'r mut usize,
    ) -> BoxFuture<'r, ReadResult<Argument>> {
        Box::pin(async move {
            if parameter.remainder {
                let rest = &tokens[(*cursor).min(tokens.len())..];
                *cursor = tokens.len();
                return match rest {
                    [] => self.missing(parameter),
                    [single] => self.read_token(parameter, single).await,
                    many => {
                        let texts = many
                            .iter()
                            .map(|token| token.as_text())
                            .collect::<Option<Vec<_>>>()
                            .ok_or_else(|| ReadError::TypeMismatch {
                                parameter: parameter.name.clone(),
                                expected: parameter.value_type.to_string(),
                            })?;
                        self.read_text(parameter, &texts.join(" ")).await
                    }
                };
            }

            match &parameter.kind {
                ParameterKind::Leaf => match tokens.get(*cursor) {
                    None => self.missing(parameter),
                    Some(token) => {
                        *cursor += 1;
                        self.read_token(parameter, token).await
                    }
                },
                ParameterKind::Complex(complex) => {
                    if *cursor >= tokens.len() && (parameter.optional || parameter.nullable) {
                        return self.missing(parameter);
                    }
                    let mut children = Vec::with_capacity(complex.parameters.len());
                    for child in &complex.parameters {
                        children.push(self.resolve_positional(child, tokens, &mut *cursor).await?);
                    }
                    let children = Arguments::new(children);
                    let built = catch_unwind(AssertUnwindSafe(|| (complex.constructor)(&children)))
                        .unwrap_or_else(|panic| {
                            Err(anyhow::anyhow!("constructor panicked: {}", panic_message(&*panic)))
                        })
                        .map_err(|error| ReadError::Construction {
                            parameter: parameter.name.clone(),
                            message: error.to_string(),
                            error: Some(Arc::new(error)),
                        })?;
                    Ok(Argument::Value(built))
                }
            }
        })
    }

    async fn resolve_named(
        &self,
        parameter: &Parameter,
        named: &HashMap<String, Option<String>>,
    ) -> ReadResult<Argument> {
        let given = named.iter().find(|(key, _)| {
            parameter
                .names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(key))
        });
        match given {
            None => self.missing(parameter),
            Some((_, Some(raw))) => self.read_text(parameter, raw).await,
            Some((_, None)) if parameter.value_type.is::<bool>() => {
                Ok(Argument::Value(Arc::new(true)))
            }
            Some((key, None)) => Err(ReadError::Conversion {
                parameter: parameter.name.clone(),
                expected: parameter.value_type.to_string(),
                raw: format!("--{}", key),
                reason: "the flag needs a value ('--name: value')".to_string(),
            }),
        }
    }

    async fn read_token(&self, parameter: &Parameter, token: &Token) -> ReadResult<Argument> {
        match token {
            Token::Typed(value) if parameter.value_type.matches(value) => {
                Ok(Argument::Value(value.clone()))
            }
            Token::Typed(_) => Err(ReadError::TypeMismatch {
                parameter: parameter.name.clone(),
                expected: parameter.value_type.to_string(),
            }),
            Token::Text(raw) => self.read_text(parameter, raw).await,
        }
    }

    async fn read_text(&self, parameter: &Parameter, raw: &str) -> ReadResult<Argument> {
        if parameter.nullable && raw.eq_ignore_ascii_case(NULL_LITERAL) {
            return Ok(Argument::Missing);
        }

        let reader = match &parameter.reader {
            Some(reader) => reader.clone(),
            None if parameter.value_type.is::<String>() => {
                return Ok(Argument::Value(Arc::new(raw.to_string())));
            }
            None => self
                .readers
                .get(parameter.value_type.id())
                .ok_or_else(|| ReadError::NoReader {
                    parameter: parameter.name.clone(),
                    expected: parameter.value_type.to_string(),
                })?,
        };

        let value = AssertUnwindSafe(reader.read(self.context, parameter, raw))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(format!("the reader panicked: {}", panic_message(&*panic))))
            .map_err(|reason| ReadError::Conversion {
                parameter: parameter.name.clone(),
                expected: parameter.value_type.to_string(),
                raw: raw.to_string(),
                reason,
            })?;
        self.typed(parameter, value)
    }

    /// No token was given: ask the context, then fall back to the default.
    fn missing(&self, parameter: &Parameter) -> ReadResult<Argument> {
        if !(parameter.optional || parameter.nullable) {
            return Err(ReadError::Missing {
                parameter: parameter.name.clone(),
            });
        }
        let supplied = match self.context.missing_values() {
            Some(provider) => Some(
                catch_unwind(AssertUnwindSafe(|| provider.resolve(self.context, parameter)))
                    .map_err(|panic| ReadError::Construction {
                        parameter: parameter.name.clone(),
                        message: format!("missing-value provider panicked: {}", panic_message(&*panic)),
                        error: None,
                    })?,
            ),
            None => None,
        };
        match supplied {
            Some(MissingValue::Value(value)) => self.typed(parameter, value),
            Some(MissingValue::Missing) | None => Ok(parameter
                .default
                .clone()
                .map(Argument::Value)
                .unwrap_or(Argument::Missing)),
        }
    }

    fn typed(&self, parameter: &Parameter, value: Value) -> ReadResult<Argument> {
        if parameter.value_type.matches(&value) {
            Ok(Argument::Value(value))
        } else {
            Err(ReadError::TypeMismatch {
                parameter: parameter.name.clone(),
                expected: parameter.value_type.to_string(),
            })
        }
    }
}
