//! Restricted working directory for the model process

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{BenchError, BenchResult};

/// Directory the model process runs in
///
/// Either a private temporary directory (removed on drop) or a configured directory that
/// is created if needed and left in place.
#[derive(Debug)]
pub struct WorkDir {
    /// Temporary directory (owned, will be cleaned up on drop)
    temp_dir: Option<TempDir>,

    root: PathBuf,
}

impl WorkDir {
    /// Create a fresh temporary working directory
    pub fn temporary() -> BenchResult<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("mfbench-")
            .tempdir()
            .map_err(|e| BenchError::io_at(format!("Failed to create temporary directory: {}", e), "<tmp>"))?;
        let root = temp_dir.path().to_path_buf();

        Ok(Self {
            temp_dir: Some(temp_dir),
            root,
        })
    }

    /// Use a specific directory (not temporary)
    pub fn at_path(path: impl AsRef<Path>) -> BenchResult<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            BenchError::io_at(
                format!("Failed to create working directory: {}", e),
                root.display().to_string(),
            )
        })?;

        Ok(Self {
            temp_dir: None,
            root,
        })
    }

    /// Configured directory when given, otherwise a temporary one
    pub fn resolve(configured: Option<&Path>) -> BenchResult<Self> {
        match configured {
            Some(path) => Self::at_path(path),
            None => Self::temporary(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }
}
