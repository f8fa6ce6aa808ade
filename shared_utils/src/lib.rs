//! Small helpers shared by every crate in the workspace.

pub mod config;
pub mod env;

pub use config::ConfigError;
pub use env::{MissingEnvVarError, env_var_opt, env_var_or, get_env_var, parse_env_var};
