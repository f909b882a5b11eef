// src/fs/mock.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use super::FileSystem;

#[derive(Debug, Default)]
struct MockState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// In-memory filesystem. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every directory created so far, sorted.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.lock().dirs.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_dir_chain(state: &mut MockState, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.dirs.insert(ancestor.to_path_buf());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.files.contains_key(path) {
            return Err(anyhow!("{:?} exists and is a file", path));
        }
        Self::add_dir_chain(&mut state, path);
        Ok(())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.dirs.contains(path) {
            return Err(anyhow!("{:?} is a directory", path));
        }
        if let Some(parent) = path.parent() {
            Self::add_dir_chain(&mut state, parent);
        }
        state.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self.lock();
        let bytes = state
            .files
            .get(path)
            .ok_or_else(|| anyhow!("file not found: {:?}", path))?;
        String::from_utf8(bytes.clone()).map_err(|e| anyhow!("invalid utf-8 in {:?}: {e}", path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.dirs.contains(to) {
            return Err(anyhow!("{:?} is a directory", to));
        }
        let bytes = state
            .files
            .remove(from)
            .ok_or_else(|| anyhow!("file not found: {:?}", from))?;
        state.files.insert(to.to_path_buf(), bytes);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("file not found: {:?}", path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }
}
