//! Local files written by a source fetch.
//!
//! Bytes are written to a sibling `.partial` file which is renamed over the
//! final path only once the download has completed, so a truncated download
//! is never visible under the name the caller asked for.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::warn;

const PARTIAL_SUFFIX: &str = ".partial";

/// Path of the in-progress file used while downloading to `path`.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or(OsStr::new("")).to_os_string();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// A download in progress.
pub(crate) struct StagedFile {
    final_path: PathBuf,
    partial_path: PathBuf,
    file: File,
}

impl StagedFile {
    /// Create the partial file for `path`, creating parent directories as needed.
    pub async fn create(path: &Path) -> io::Result<Self> {
        if path.file_name().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial_path = partial_path(path);
        let file = File::create(&partial_path).await?;

        Ok(Self {
            final_path: path.to_path_buf(),
            partial_path,
            file,
        })
    }

    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data).await
    }

    /// Flush and move the partial file into place.
    pub async fn commit(self) -> io::Result<()> {
        let StagedFile {
            final_path,
            partial_path,
            mut file,
        } = self;
        file.flush().await?;
        drop(file);
        fs::rename(&partial_path, &final_path).await
    }

    /// Drop the partial file.
    pub async fn discard(self) {
        let StagedFile {
            partial_path, file, ..
        } = self;
        drop(file);
        match fs::remove_file(&partial_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %partial_path.display(),
                error = %e,
                "Failed to remove partial download"
            ),
        }
    }
}
