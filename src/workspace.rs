// src/workspace.rs

//! Sandbox workspace layout: `worlds/`, `code/` and `binaries/` under a root
//! directory, plus the fixed path user code is written to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

pub const SUBDIRECTORIES: [&str; 3] = ["worlds", "code", "binaries"];
const CODE_FILE: &str = "academy.py";
const STAGED_FILE: &str = ".staged_academy.py";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(root, Arc::new(RealFileSystem))
    }

    pub fn with_fs(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace directories. Idempotent.
    pub fn ensure(&self) -> Result<()> {
        for dir in SUBDIRECTORIES {
            let path = self.root.join(dir);
            if !self.fs.is_dir(&path) {
                self.fs.create_dir_all(&path)?;
                debug!(path = %path.display(), "created workspace directory");
            }
        }
        info!(root = %self.root.display(), "workspace ready");
        Ok(())
    }

    pub fn code_path(&self) -> PathBuf {
        self.root.join("code").join(CODE_FILE)
    }

    /// Persist user code at [`Workspace::code_path`], replacing what was
    /// there.
    pub fn write_code(&self, code: &str) -> Result<PathBuf> {
        let path = self.code_path();
        self.fs
            .write(&path, code.as_bytes())
            .with_context(|| "persisting user code")?;
        debug!(path = %path.display(), bytes = code.len(), "user code written");
        Ok(path)
    }

    /// Where code waits while it is linted. Same directory as
    /// [`Workspace::code_path`] so committing is a rename.
    pub fn staged_path(&self) -> PathBuf {
        self.root.join("code").join(STAGED_FILE)
    }

    /// Write code next to the live file without touching it.
    pub fn stage_code(&self, code: &str) -> Result<PathBuf> {
        let path = self.staged_path();
        self.fs
            .write(&path, code.as_bytes())
            .with_context(|| "staging user code")?;
        debug!(path = %path.display(), bytes = code.len(), "user code staged");
        Ok(path)
    }

    /// Replace the live code with the staged file.
    pub fn commit_staged(&self) -> Result<PathBuf> {
        let path = self.code_path();
        self.fs
            .rename(&self.staged_path(), &path)
            .with_context(|| "committing staged user code")?;
        debug!(path = %path.display(), "staged user code committed");
        Ok(path)
    }

    /// Drop a staged file that failed lint. Missing is fine.
    pub fn discard_staged(&self) {
        let path = self.staged_path();
        if self.fs.is_file(&path) {
            if let Err(e) = self.fs.remove_file(&path) {
                debug!(path = %path.display(), error = %e, "could not remove staged code");
            }
        }
    }
}
