//! Capture-and-restore of the shared scheme file, plus the transient paths
//! an interrupted run removes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{patch_scheme, SchemeError};
use crate::cleanup::remove_path;
use crate::progress::Progress;

#[derive(Debug)]
struct Snapshot {
    path: PathBuf,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct Pending {
    snapshot: Option<Snapshot>,
    transient: Vec<PathBuf>,
}

/// Holds the scheme snapshot and the run's transient paths.
///
/// Both `SchemeGuard::drop` and the interrupt handler restore through the
/// registry. The snapshot is taken out under the lock and written while the
/// lock is held, so the original bytes are written back exactly once and a
/// concurrent caller waits for that write to finish. Patched bytes are also
/// written under the lock, and only while the snapshot is still pending.
///
/// Transient paths are tracked so an interrupted run can remove them before
/// the process exits.
#[derive(Debug, Clone, Default)]
pub struct RestoreRegistry {
    pending: Arc<Mutex<Pending>>,
}

impl RestoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // A panic while holding the lock must not prevent restoration
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, path: &Path, content: Vec<u8>) {
        self.lock().snapshot = Some(Snapshot {
            path: path.to_path_buf(),
            content,
        });
    }

    /// Write `content` over the scheme unless it was already restored.
    ///
    /// Returns `false` when nothing was written.
    fn write_while_pending(&self, path: &Path, content: &[u8]) -> Result<bool, SchemeError> {
        let pending = self.lock();
        if pending.snapshot.is_none() {
            return Ok(false);
        }
        fs::write(path, content).map_err(|source| SchemeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(true)
    }

    /// Whether a snapshot is waiting to be written back
    pub fn is_pending(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    /// Write the pending snapshot back to disk.
    ///
    /// Returns the restored path, or `None` if nothing was pending.
    pub fn restore_now(&self) -> Result<Option<PathBuf>, SchemeError> {
        let mut pending = self.lock();
        match pending.snapshot.take() {
            Some(snapshot) => {
                fs::write(&snapshot.path, &snapshot.content).map_err(|source| SchemeError::Io {
                    path: snapshot.path.display().to_string(),
                    source,
                })?;
                tracing::debug!(path = %snapshot.path.display(), "scheme restored");
                Ok(Some(snapshot.path))
            }
            None => Ok(None),
        }
    }

    /// Track paths that must not survive an interrupt
    pub fn track<I>(&self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.lock().transient.extend(paths);
    }

    /// Forget all tracked paths (the run cleaned them up itself)
    pub fn untrack_all(&self) {
        self.lock().transient.clear();
    }

    /// Currently tracked paths
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.lock().transient.clone()
    }

    /// Remove every tracked path, attempting all before reporting the first error.
    ///
    /// Returns the number of paths that were tracked.
    pub fn remove_tracked(&self) -> io::Result<usize> {
        let mut pending = self.lock();
        let paths = std::mem::take(&mut pending.transient);
        let mut first_error = None;
        for path in &paths {
            if let Err(e) = remove_path(path) {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove tracked path");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(paths.len()),
        }
    }
}

/// Scoped mutation of the shared scheme.
///
/// `capture` reads the original bytes before anything can fail and
/// registers them for restoration. Dropping the guard (or calling
/// `restore`) writes them back.
#[derive(Debug)]
pub struct SchemeGuard {
    path: PathBuf,
    original: Vec<u8>,
    registry: RestoreRegistry,
    progress: Progress,
}

impl SchemeGuard {
    /// Snapshot the scheme at `path`
    pub fn capture(
        path: &Path,
        registry: &RestoreRegistry,
        progress: Progress,
    ) -> Result<Self, SchemeError> {
        let original = fs::read(path).map_err(|source| SchemeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        registry.register(path, original.clone());

        Ok(Self {
            path: path.to_path_buf(),
            original,
            registry: registry.clone(),
            progress,
        })
    }

    /// Point the scheme's TestAction at `plan_reference`
    pub fn patch(&self, plan_reference: &str) -> Result<(), SchemeError> {
        let path_display = self.path.display().to_string();
        let xml = std::str::from_utf8(&self.original).map_err(|e| SchemeError::Malformed {
            path: path_display.clone(),
            message: e.to_string(),
        })?;

        let patched = patch_scheme(xml, plan_reference).map_err(|e| e.at(&path_display))?;

        if !self.registry.write_while_pending(&self.path, patched.as_bytes())? {
            tracing::debug!(path = %path_display, "scheme already restored, patch skipped");
        }
        Ok(())
    }

    /// Restore now and report it; the guard is spent afterwards
    pub fn restore(self) -> Result<(), SchemeError> {
        let result = self.registry.restore_now();
        if let Ok(Some(_)) = result {
            self.progress.step("Restored scheme");
        }
        // Drop finds nothing pending
        result.map(|_| ())
    }
}

impl Drop for SchemeGuard {
    fn drop(&mut self) {
        match self.registry.restore_now() {
            Ok(Some(_)) => self.progress.step("Restored scheme"),
            Ok(None) => {}
            Err(e) => self.progress.failure(format!("Failed to restore scheme: {}", e)),
        }
    }
}
