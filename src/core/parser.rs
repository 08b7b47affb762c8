// src/core/parser.rs

use std::collections::HashMap;
use thiserror::Error;

use crate::core::context::Input;
use crate::models::Token;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No command was given.")]
    Empty,
    #[error("Input does not start with a command prefix.")]
    MissingPrefix,
    #[error("Unterminated quoted argument: {0}")]
    UnterminatedQuote(String),
    #[error("The command name must be text.")]
    NonTextName,
}

type ParseOutcome = Result<ParseResult, ParseError>;

/// One input line split into its parts.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub name: String,
    pub positional: Vec<Token>,
    pub named: HashMap<String, Option<String>>,
    pub prefix: Option<String>,
}

/// Whitespace/quote-aware tokenizer. Embedded quotes cannot be escaped.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    prefixes: Vec<String>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// With prefixes, only input starting with one of them is a command.
    pub fn with_prefixes(prefixes: Vec<String>) -> Self {
        let mut prefixes: Vec<String> = prefixes.into_iter().filter(|p| !p.is_empty()).collect();
        // Longest first so "!!" is tried before "!".
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn parse_input(&self, input: &Input) -> ParseOutcome {
        match input {
            Input::Text(raw) => self.parse(raw),
            Input::Tokens(tokens) => self.parse_tokens(tokens.clone()),
        }
    }

    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, body) = self.strip_prefix(trimmed)?;
        let mut words = body.split_whitespace();
        let name = words.next().ok_or(ParseError::Empty)?;

        let mut result = ParseResult {
            name: name.to_string(),
            prefix,
            ..Default::default()
        };
        let mut pending_named: Option<String> = None;
        let mut span: Option<Vec<&str>> = None;

        for word in words {
            if let Some(open) = span.as_mut() {
                open.push(word);
                if word.ends_with('"') {
                    let joined = open.join(" ");
                    span = None;
                    emit(&mut result, &mut pending_named, unquote(&joined));
                }
                continue;
            }

            if word.len() >= 2 && word.starts_with('"') && word.ends_with('"') {
                emit(&mut result, &mut pending_named, unquote(word));
                continue;
            }

            if word.starts_with('"') {
                span = Some(vec![word]);
                continue;
            }

            if let Some(flag) = word.strip_prefix("--") {
                let flag_name = flag.strip_suffix(':').unwrap_or(flag);
                if !flag_name.is_empty() {
                    flush_pending(&mut result, &mut pending_named);
                    if flag.ends_with(':') {
                        pending_named = Some(flag_name.to_string());
                    } else {
                        result.named.insert(flag_name.to_string(), None);
                    }
                    continue;
                }
            } else if word.len() > 1 && word.starts_with('-') && word.parse::<f64>().is_err() {
                flush_pending(&mut result, &mut pending_named);
                for c in word[1..].chars() {
                    result.named.insert(c.to_string(), None);
                }
                continue;
            }

            emit(&mut result, &mut pending_named, word);
        }

        if let Some(open) = span {
            return Err(ParseError::UnterminatedQuote(open.join(" ")));
        }
        flush_pending(&mut result, &mut pending_named);

        log::debug!(
            "Parsed '{}': {} positional, {} named",
            result.name,
            result.positional.len(),
            result.named.len()
        );
        Ok(result)
    }

    /// Pre-tokenized input: the first token is the name, the rest are positional as-is.
    pub fn parse_tokens(&self, tokens: Vec<Token>) -> ParseOutcome {
        let mut tokens = tokens.into_iter();
        let name = match tokens.next() {
            None => return Err(ParseError::Empty),
            Some(Token::Typed(_)) => return Err(ParseError::NonTextName),
            Some(Token::Text(text)) if text.trim().is_empty() => return Err(ParseError::Empty),
            Some(Token::Text(text)) => text,
        };
        Ok(ParseResult {
            name: name.trim().to_string(),
            positional: tokens.collect(),
            named: HashMap::new(),
            prefix: None,
        })
    }

    fn strip_prefix<'a>(&self, input: &'a str) -> Result<(Option<String>, &'a str), ParseError> {
        if self.prefixes.is_empty() {
            return Ok((None, input));
        }
        let prefix = self
            .prefixes
            .iter()
            .find(|p| input.starts_with(p.as_str()))
            .ok_or(ParseError::MissingPrefix)?;
        let body = input[prefix.len()..].trim_start();
        if body.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok((Some(prefix.clone()), body))
    }
}

fn unquote(text: &str) -> &str {
    let text = text.strip_prefix('"').unwrap_or(text);
    text.strip_suffix('"').unwrap_or(text)
}

fn emit(result: &mut ParseResult, pending_named: &mut Option<String>, value: &str) {
    match pending_named.take() {
        Some(name) => {
            result.named.insert(name, Some(value.to_string()));
        }
        None => result.positional.push(Token::Text(value.to_string())),
    }
}

fn flush_pending(result: &mut ParseResult, pending_named: &mut Option<String>) {
    if let Some(name) = pending_named.take() {
        result.named.insert(name, None);
    }
}
