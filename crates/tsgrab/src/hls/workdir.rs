// Per-download working directory holding one file per segment index.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::hls::HlsDownloaderError;

/// Scoped directory for segment files. Removed when closed or dropped, so
/// every exit path of a download cleans up after itself.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Creates a fresh directory under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self, HlsDownloaderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tsgrab-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Created working directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stable location of the segment at `index`.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("{index}.ts"))
    }

    /// Segment paths in index order.
    pub fn segment_paths(&self, count: usize) -> Vec<PathBuf> {
        (0..count).map(|index| self.segment_path(index)).collect()
    }

    /// Removes the directory, reporting failures instead of ignoring them.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed working directory"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove working directory"),
        }
    }
}
