// Library root: the alarm engine and its collaborators, exposed for the
// integration tests in `tests/`. The binary entry point is `src/main.rs`.

pub mod alarms;
pub mod backend;
pub mod context;
pub mod controller;
pub mod error;
pub mod queries;
pub mod services;

// These modules are only needed by the binary.
// Declared pub so integration tests can reach them if needed.
pub mod cli;
pub mod config;
pub mod logging;
