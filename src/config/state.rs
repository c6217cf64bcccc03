// Application state module
// Read-only state shared by every connection task

use std::path::{Path, PathBuf};

use super::types::Config;
use crate::error::StartupError;

/// The directory exposed over HTTP, canonicalized once at startup
#[derive(Debug, Clone)]
pub struct ServedRoot {
    path: PathBuf,
}

impl ServedRoot {
    /// Canonicalize `path` and check that it names a directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|source| StartupError::Root {
            path: path.to_path_buf(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(StartupError::RootNotDirectory { path: canonical });
        }
        Ok(Self { path: canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Application state
///
/// Nothing in here changes after startup, so tasks share it through an `Arc`
/// without any locking.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub root: ServedRoot,
}

impl AppState {
    /// Create `AppState`, opening the served root named by the config
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let root = ServedRoot::open(&config.files.root)?;
        Ok(Self { config, root })
    }
}
