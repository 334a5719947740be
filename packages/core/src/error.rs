use thiserror::Error;

use crate::config::ConfigError;
use crate::controller::ControllerError;

/// Unified application error.
///
/// Everything that stops the binary from completing a run ends up here
/// so `main` has a single place to log it and pick the exit code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Startup error: {0}")]
    Controller(#[from] ControllerError),

    #[error("{} check(s) failed: {}", .0.len(), .0.join(", "))]
    ChecksFailed(Vec<&'static str>),
}
