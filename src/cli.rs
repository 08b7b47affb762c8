// src/cli.rs

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "parley: run text commands from a console.", long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Configuration file. Defaults to `parley.toml` in the system config directory.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Write the default configuration file and exit.
    #[arg(long)]
    pub init_config: bool,

    /// Run each console command on its own task instead of waiting for it.
    #[arg(long)]
    pub detached: bool,

    /// A single command to run instead of starting the console, e.g. `math add 1 2`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
