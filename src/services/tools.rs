use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{ConverterConfig, ImageFormat};

/// Failure of an external tool run
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{0} exited successfully but produced no output")]
    NoOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs a prepared command to completion and turns every failure into a `ToolError`.
///
/// The child is killed if the timeout elapses (or the calling future is dropped).
/// Stderr is captured so it can be reported with the exit status.
pub async fn run_tool(
    mut cmd: Command,
    program: &str,
    timeout: Option<Duration>,
) -> Result<(), ToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {:?}", cmd);

    let child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                program: program.to_string(),
                secs: limit.as_secs(),
            })??,
        None => child.wait_with_output().await?,
    };

    if !output.status.success() {
        return Err(ToolError::Exit {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Checks that a program can be started at all
async fn probe(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .is_ok()
}

/// Converts every page of a PDF into one image file
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Writes `<output_prefix>-<n>.<ext>` for each page of `input`
    async fn rasterize(
        &self,
        input: &Path,
        format: ImageFormat,
        output_prefix: &Path,
    ) -> Result<(), ToolError>;

    /// Check if the rasterizer is available
    async fn health_check(&self) -> bool;
}

/// Poppler's `pdftoppm`
pub struct PdftoppmRasterizer {
    program: String,
    timeout: Option<Duration>,
}

impl PdftoppmRasterizer {
    pub fn new(program: String, timeout: Option<Duration>) -> Self {
        Self { program, timeout }
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(
        &self,
        input: &Path,
        format: ImageFormat,
        output_prefix: &Path,
    ) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(format.flag()).arg(input).arg(output_prefix);
        run_tool(cmd, &self.program, self.timeout).await
    }

    async fn health_check(&self) -> bool {
        probe(&self.program, "-v").await
    }
}

/// Bundles a directory into a gzip-compressed tarball
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archives `parent/dir_name` so that it extracts as `dir_name/...`
    async fn archive(
        &self,
        parent: &Path,
        dir_name: &str,
        archive_path: &Path,
    ) -> Result<(), ToolError>;

    async fn health_check(&self) -> bool;
}

/// External `tar -czf`
pub struct TarCommandArchiver {
    program: String,
    timeout: Option<Duration>,
}

impl TarCommandArchiver {
    pub fn new(program: String, timeout: Option<Duration>) -> Self {
        Self { program, timeout }
    }
}

#[async_trait]
impl Archiver for TarCommandArchiver {
    async fn archive(
        &self,
        parent: &Path,
        dir_name: &str,
        archive_path: &Path,
    ) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-czf")
            .arg(archive_path)
            .arg("-C")
            .arg(parent)
            // Upload-derived name; never parsed as an option
            .arg("--")
            .arg(dir_name);
        run_tool(cmd, &self.program, self.timeout).await
    }

    async fn health_check(&self) -> bool {
        probe(&self.program, "--version").await
    }
}

/// In-process archiver built on the `tar` and `flate2` crates
pub struct NativeTarArchiver;

#[async_trait]
impl Archiver for NativeTarArchiver {
    async fn archive(
        &self,
        parent: &Path,
        dir_name: &str,
        archive_path: &Path,
    ) -> Result<(), ToolError> {
        let source_dir = parent.join(dir_name);
        let dir_name = dir_name.to_string();
        let archive_path = archive_path.to_path_buf();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = std::fs::File::create(&archive_path)?;
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            builder.append_dir_all(&dir_name, &source_dir)?;
            builder.into_inner()?.finish()?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Factory function to create the rasterizer based on config
pub fn create_rasterizer(config: &ConverterConfig) -> Arc<dyn Rasterizer> {
    Arc::new(PdftoppmRasterizer::new(
        config.rasterizer_bin.clone(),
        config.tool_timeout,
    ))
}

/// Factory function to create the archiver based on config
pub fn create_archiver(config: &ConverterConfig) -> Arc<dyn Archiver> {
    match config.archiver_type.to_lowercase().as_str() {
        "tar" | "command" => Arc::new(TarCommandArchiver::new(
            config.archiver_bin.clone(),
            config.tool_timeout,
        )),
        "native" | "builtin" => Arc::new(NativeTarArchiver),
        other => {
            warn!("Unknown archiver type '{}', using external tar", other);
            Arc::new(TarCommandArchiver::new(
                config.archiver_bin.clone(),
                config.tool_timeout,
            ))
        }
    }
}
