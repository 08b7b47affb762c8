// src/bin/parley/main.rs

mod demo;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use parley::cli::Cli;
use parley::config::{self, DispatchConfig};
use parley::constants::DEFAULT_LOG_FILTER;
use parley::system::console::{self, ConsoleResponder};
use parley::CommandContext;

use demo::Session;

/// Entry point of the console host.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("\nError: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the last command succeeded.
async fn run_cli(cli: Cli) -> Result<bool> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };

    if cli.init_config {
        config::save_config(&config_path, &DispatchConfig::default())
            .with_context(|| format!("Could not write {}", config_path.display()))?;
        println!("Configuration written to {}", config_path.display());
        return Ok(true);
    }

    let dispatch_config = config::load_or_default(&config_path)?;
    init_logging(&dispatch_config);
    log::debug!("CLI args parsed: {:?}", cli);

    let service = Arc::new(demo::service(dispatch_config).context("Invalid command set")?);
    let help = demo::help_index(&service);
    let session = Session {
        user: std::env::var("USER").unwrap_or_else(|_| "console".to_string()),
        operator: std::env::var_os("PARLEY_OPERATOR").is_some(),
    };
    let make_context = move |line: String| {
        CommandContext::new(line)
            .with_extension(session.clone())
            .with_extension(help.clone())
    };

    if cli.command.is_empty() {
        console::run_console(service, cli.detached, make_context).await?;
        return Ok(true);
    }

    let line = join_command(&cli.command);
    let mut context = make_context(line).with_responder(Arc::new(ConsoleResponder));
    let result = service.execute(&mut context).await;
    println!("{}", console::render_result(&result));
    Ok(result.is_ok())
}

/// `RUST_LOG` wins, then the config file, then the built-in default.
fn init_logging(config: &DispatchConfig) {
    let fallback = config.log_level.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(fallback)).init();
}

/// Rebuilds one input line from shell arguments, quoting those with spaces.
fn join_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
