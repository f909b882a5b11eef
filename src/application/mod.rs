// src/application/mod.rs

//! The user program the manager drives but does not implement.
//!
//! The manager only sees the [`Application`] trait; [`ProcessApplication`]
//! runs the code with an interpreter as a supervised process tree.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ManagerError, Result};

pub mod lint;
pub mod process;

pub use lint::{CommandLinter, Diagnostic, LintContext, Linter, NoopLinter};
pub use process::ProcessApplication;

/// Boxed future returned by async [`Application`] and [`Linter`] methods.
pub type AppFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Code sent with `run_application`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CodeSubmission {
    pub code: String,
    /// Program handed to the interpreter instead of the code file.
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl CodeSubmission {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Parse the `data` of a `run_application` command. A bare string is the
    /// code itself; a missing payload yields `None`.
    pub fn from_payload(data: Option<Value>) -> Result<Option<Self>> {
        match data {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(code)) => Ok(Some(Self::new(code))),
            Some(other) => serde_json::from_value(other)
                .map(Some)
                .map_err(|e| ManagerError::InvalidPayload {
                    command: "run_application".to_string(),
                    message: e.to_string(),
                }),
        }
    }
}

/// Lifecycle of the user program.
pub trait Application: Send + Sync {
    /// Persist and check the code. Fails with `LintFailed` when the checks
    /// do not pass; the previously loaded code stays in effect then.
    fn load_code<'a>(
        &'a mut self,
        submission: &'a CodeSubmission,
        exercise_id: Option<&'a str>,
    ) -> AppFuture<'a, Result<()>>;

    /// Start the loaded code.
    fn run(&mut self) -> AppFuture<'_, Result<()>>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Kill the running program, keeping the loaded code.
    fn stop(&mut self) -> AppFuture<'_, Result<()>>;

    fn restart(&mut self) -> AppFuture<'_, Result<()>>;

    /// Kill the running program and forget the loaded code.
    fn terminate(&mut self) -> AppFuture<'_, Result<()>>;

    fn is_alive(&self) -> bool;
}
