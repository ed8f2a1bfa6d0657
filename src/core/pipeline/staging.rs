//! All-or-nothing writes for the files of one item.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::ExportError;

/// Files staged as temporaries next to their targets.
///
/// Nothing is visible under the target names until [`StagedFiles::commit`].
/// Dropping without committing deletes the temporaries.
#[derive(Default)]
pub struct StagedFiles {
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, target: PathBuf, bytes: &[u8]) -> Result<(), ExportError> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(dir).map_err(|source| ExportError::Io {
            path: target.clone(),
            source,
        })?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|source| ExportError::Io {
                path: target.clone(),
                source,
            })?;
        self.staged.push((file, target));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Move every staged file to its target.
    ///
    /// If one rename fails, the targets already written are removed again.
    pub fn commit(self) -> Result<Vec<PathBuf>, ExportError> {
        let mut written = Vec::with_capacity(self.staged.len());
        for (file, target) in self.staged {
            if let Err(e) = file.persist(&target) {
                rollback(&written);
                return Err(ExportError::Io {
                    path: target,
                    source: e.error,
                });
            }
            written.push(target);
        }
        Ok(written)
    }
}

fn rollback(written: &[PathBuf]) {
    for path in written {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not roll back {}: {}", path.display(), e);
        }
    }
}

/// Stage and commit a single file
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let mut staged = StagedFiles::new();
    staged.stage(target.to_path_buf(), bytes)?;
    staged.commit().map(|_| ())
}
