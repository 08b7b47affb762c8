// src/constants.rs

/// Name of the directory holding parley's configuration (under the system config dir).
pub const APP_DIR: &str = "parley";

/// Name of the dispatcher configuration file.
pub const CONFIG_FILENAME: &str = "parley.toml";

/// Log filter used when neither `RUST_LOG` nor the config file sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Literal accepted by nullable parameters as "no value".
pub const NULL_LITERAL: &str = "null";
