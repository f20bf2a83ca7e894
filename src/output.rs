//! Output files created by one invocation.
//!
//! Commands that fan out to several destination files share one
//! [`OutputRegistry`]. Claiming a path checks for an existing file and for
//! an earlier claim under one lock, so two workers can never both decide to
//! create the same file.

use std::collections::HashSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{PlanError, PlanResult};

/// Paths claimed for writing during this invocation.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    force: bool,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl OutputRegistry {
    /// With `force`, existing files may be overwritten.
    pub fn new(force: bool) -> Self {
        Self {
            force,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Claim `path`. Fails if it was already claimed, or if it exists and
    /// overwriting is not allowed.
    pub fn claim(&self, path: &Path) -> PlanResult<()> {
        if self.try_claim(path)? {
            Ok(())
        } else {
            Err(PlanError::OutputExists {
                path: path.to_path_buf(),
            })
        }
    }

    /// Like [`OutputRegistry::claim`], but an existing file is reported as
    /// `Ok(false)` so the caller can skip it.
    pub fn try_claim(&self, path: &Path) -> PlanResult<bool> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if claimed.contains(path) {
            return Err(PlanError::DuplicateOutput {
                path: path.to_path_buf(),
            });
        }
        if !self.force && path.exists() {
            debug!(path = %path.display(), "output exists");
            return Ok(false);
        }
        claimed.insert(path.to_path_buf());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write `content` to `path` through a temporary file in the same directory,
/// so readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, content: &[u8]) -> PlanResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PlanError::Io(e.error))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote output");
    Ok(())
}
