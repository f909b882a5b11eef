// src/application/lint.rs

//! Static checks run on user code before it executes.

use std::path::PathBuf;
use std::process::Stdio;

use regex::Regex;
use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

use crate::application::AppFuture;
use crate::config::LintSection;
use crate::errors::{ManagerError, Result};

/// One blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Where the code lives and what it belongs to.
#[derive(Debug, Clone)]
pub struct LintContext {
    /// Path the code was persisted at.
    pub code_path: PathBuf,
    pub exercise_id: Option<String>,
}

/// `check(code, context) -> diagnostics`. An empty result lets the code run.
pub trait Linter: Send + Sync {
    fn check<'a>(&'a self, code: &'a str, context: &'a LintContext) -> AppFuture<'a, Result<Vec<Diagnostic>>>;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLinter;

impl Linter for NoopLinter {
    fn check<'a>(&'a self, _code: &'a str, _context: &'a LintContext) -> AppFuture<'a, Result<Vec<Diagnostic>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Runs an external checker and keeps the output lines matching a pattern.
///
/// `{file}` and `{exercise_id}` in the command are substituted.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    command: String,
    error_pattern: Regex,
    line_number: Regex,
}

impl CommandLinter {
    pub fn new(command: impl Into<String>, error_pattern: &str) -> Result<Self> {
        let error_pattern = Regex::new(error_pattern)
            .map_err(|e| ManagerError::ConfigError(format!("invalid lint error pattern: {e}")))?;
        let line_number = Regex::new(r":(\d+):")
            .map_err(|e| ManagerError::ConfigError(format!("invalid line pattern: {e}")))?;
        Ok(Self {
            command: command.into(),
            error_pattern,
            line_number,
        })
    }

    fn render(&self, context: &LintContext) -> String {
        self.command
            .replace("{file}", &context.code_path.display().to_string())
            .replace("{exercise_id}", context.exercise_id.as_deref().unwrap_or(""))
    }
}

impl Linter for CommandLinter {
    fn check<'a>(&'a self, _code: &'a str, context: &'a LintContext) -> AppFuture<'a, Result<Vec<Diagnostic>>> {
        Box::pin(async move {
            let command = self.render(context);
            debug!(cmd = %command, "running lint command");

            let output = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::null())
                .output()
                .await?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            let diagnostics: Vec<Diagnostic> = stdout
                .lines()
                .chain(stderr.lines())
                .filter(|line| self.error_pattern.is_match(line))
                .map(|line| {
                    let number = self
                        .line_number
                        .captures(line)
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse().ok());
                    Diagnostic::new(number, line.trim())
                })
                .collect();

            debug!(count = diagnostics.len(), status = ?output.status.code(), "lint finished");
            Ok(diagnostics)
        })
    }
}

/// Linter described by the `[lint]` settings.
pub fn from_settings(settings: &LintSection) -> Result<Box<dyn Linter>> {
    match &settings.command {
        Some(command) => Ok(Box::new(CommandLinter::new(command.clone(), &settings.error_pattern)?)),
        None => Ok(Box::new(NoopLinter)),
    }
}

/// Join diagnostics into one error message.
pub fn describe(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| match d.line {
            Some(line) => format!("line {line}: {}", d.message),
            None => d.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
