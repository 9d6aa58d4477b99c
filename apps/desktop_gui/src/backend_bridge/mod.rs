//! Backend worker: owns the tokio runtime and the workflow client.

pub mod commands;
pub mod prompt;
pub mod runtime;
