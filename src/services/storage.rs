use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::utils::validation::ArchiveRef;

const SCRATCH_DIR: &str = "scratch";
const ARCHIVES_DIR: &str = "archives";

/// Holds page images and the built archive inside a workspace. Sanitized
/// upload names never start with '.', so it cannot clash with the source file.
const OUTPUT_DIR: &str = ".output";

/// Prefix of every job workspace directory under `scratch/`
pub const WORKSPACE_PREFIX: &str = "job-";

/// Fixed layout of the working directory:
///
/// ```text
/// <root>/scratch/job-<id>-XXXX/<upload>.pdf
/// <root>/scratch/job-<id>-XXXX/.output/<base>/<base>-<n>.jpg
/// <root>/archives/<id>/<base>.tar.gz
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

/// Per-request workspace. The directory and everything in it is removed when
/// this value is dropped.
#[derive(Debug)]
pub struct JobWorkspace {
    pub job_id: Uuid,
    dir: TempDir,
}

impl JobWorkspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file directly inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn output_root(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_DIR)
    }
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    pub fn archives_root(&self) -> PathBuf {
        self.root.join(ARCHIVES_DIR)
    }

    /// Creates the sub-layout if missing
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.scratch_root()).await?;
        tokio::fs::create_dir_all(self.archives_root()).await?;
        Ok(())
    }

    /// Opens a fresh workspace under a new random job id
    pub fn create_workspace(&self) -> io::Result<JobWorkspace> {
        let job_id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", WORKSPACE_PREFIX, job_id))
            .tempdir_in(self.scratch_root())?;
        Ok(JobWorkspace { job_id, dir })
    }

    pub fn archive_dir(&self, job_id: Uuid) -> PathBuf {
        self.archives_root().join(job_id.to_string())
    }

    pub fn archive_path(&self, archive: &ArchiveRef) -> PathBuf {
        self.archive_dir(archive.job_id).join(&archive.file_name)
    }

    /// Moves a finished archive out of its workspace into `archives/`
    pub async fn publish_archive(&self, built: &Path, archive: &ArchiveRef) -> io::Result<()> {
        let dir = self.archive_dir(archive.job_id);
        tokio::fs::create_dir_all(&dir).await?;
        if let Err(e) = tokio::fs::rename(built, self.archive_path(archive)).await {
            let _ = tokio::fs::remove_dir_all(&dir).await;
            return Err(e);
        }
        Ok(())
    }

    pub async fn archive_exists(&self, archive: &ArchiveRef) -> bool {
        tokio::fs::metadata(self.archive_path(archive))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Removes the archive together with its job directory
    pub async fn remove_archive(&self, archive: &ArchiveRef) -> io::Result<()> {
        match tokio::fs::remove_dir_all(self.archive_dir(archive.job_id)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
