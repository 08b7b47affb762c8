// src/system/console.rs

use std::sync::Arc;

use async_trait::async_trait;
use dialoguer::{Error as DialoguerError, Input, console, theme::ColorfulTheme};
use thiserror::Error;

use crate::core::context::{Cancellation, CommandContext, Responder};
use crate::core::dispatcher::CommandService;
use crate::core::results::ExecutionResult;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Console input error: {0}")]
    Dialoguer(#[from] DialoguerError),
    #[error("The input task stopped unexpectedly: {0}")]
    Join(#[from] tokio::task::JoinError),
}

type ConsoleResult<T> = Result<T, ConsoleError>;

/// Writes replies to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleResponder;

#[async_trait]
impl Responder for ConsoleResponder {
    async fn respond(&self, text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// One status line for a finished execution, plus any notices.
pub fn render_result(result: &ExecutionResult) -> String {
    match result {
        Ok(success) => {
            let mut out = console::style(format!("✔ {}", success.name)).green().to_string();
            for notice in &success.notices {
                out.push('\n');
                out.push_str(&console::style(format!("  ! {}", notice)).yellow().to_string());
            }
            out
        }
        Err(error) => {
            let subject = error.command().unwrap_or("input");
            console::style(format!("✖ [{}] {}", error.stage(), subject))
                .red()
                .to_string()
        }
    }
}

/// Reads one line; `None` when the user asks to leave.
async fn prompt_line() -> ConsoleResult<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("parley")
            .allow_empty(true)
            .interact_text()
    })
    .await??;
    let line = line.trim().to_string();
    if matches!(line.as_str(), ":quit" | ":exit" | ":q") {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Interactive loop. `make_context` builds the context for each line; the
/// console adds its responder and a cancellation signal. In detached mode each
/// line runs on its own task and `:cancel` signals every execution still running.
pub async fn run_console<F>(
    service: Arc<CommandService>,
    detached: bool,
    make_context: F,
) -> ConsoleResult<()>
where
    F: Fn(String) -> CommandContext,
{
    println!(
        "{}",
        console::style("Type a command, ':cancel' to cancel detached work, ':quit' to leave.").dim()
    );
    let mut running: Vec<Cancellation> = Vec::new();

    while let Some(line) = prompt_line().await? {
        if line.is_empty() {
            continue;
        }
        if line == ":cancel" {
            log::info!("Cancelling {} detached execution(s).", running.len());
            running.drain(..).for_each(|cancellation| cancellation.cancel());
            continue;
        }

        let cancellation = Cancellation::new();
        let mut context = make_context(line)
            .with_responder(Arc::new(ConsoleResponder))
            .with_cancellation(cancellation.clone());

        if detached {
            running.retain(|c| !c.is_cancelled());
            running.push(cancellation);
            let handle = service.spawn(context);
            tokio::spawn(async move {
                match handle.await {
                    Ok(result) => println!("{}", render_result(&result)),
                    Err(e) => log::error!("Detached execution failed to join: {}", e),
                }
            });
        } else {
            let result = service.execute(&mut context).await;
            println!("{}", render_result(&result));
        }
    }
    Ok(())
}
