use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::error::AppError;
use crate::config::{ConverterConfig, ImageFormat};
use crate::services::storage::{JobWorkspace, StorageLayout};
use crate::services::tools::{Archiver, Rasterizer, ToolError};
use crate::utils::validation::{ARCHIVE_SUFFIX, ArchiveRef, derive_base_name};

/// Result of a finished conversion
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub archive: ArchiveRef,
    pub page_count: usize,
}

/// Runs the rasterize → archive pipeline for one uploaded document
pub struct ConversionService {
    layout: Arc<StorageLayout>,
    rasterizer: Arc<dyn Rasterizer>,
    archiver: Arc<dyn Archiver>,
    image_format: ImageFormat,
}

impl ConversionService {
    pub fn new(
        layout: Arc<StorageLayout>,
        rasterizer: Arc<dyn Rasterizer>,
        archiver: Arc<dyn Archiver>,
        config: &ConverterConfig,
    ) -> Self {
        Self {
            layout,
            rasterizer,
            archiver,
            image_format: config.image_format,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn rasterizer(&self) -> &dyn Rasterizer {
        self.rasterizer.as_ref()
    }

    pub fn archiver(&self) -> &dyn Archiver {
        self.archiver.as_ref()
    }

    /// Opens the workspace a single conversion request works in
    pub fn open_job(&self) -> Result<JobWorkspace, AppError> {
        self.layout.create_workspace().map_err(AppError::UploadWrite)
    }

    /// Converts `stored_name` (a file inside `workspace`) into a published archive.
    ///
    /// The workspace is consumed: the source, the page images and any partial
    /// archive are removed when this returns, whatever the outcome.
    pub async fn convert(
        &self,
        workspace: JobWorkspace,
        stored_name: &str,
    ) -> Result<ConversionOutcome, AppError> {
        let source = workspace.file(stored_name);
        if stored_name.is_empty() || !is_file(&source).await {
            return Err(AppError::SourceNotFound(stored_name.to_string()));
        }

        let base = derive_base_name(stored_name).map_err(|e| AppError::UploadParse(e.to_string()))?;

        let output_root = workspace.output_root();
        let pages_dir = output_root.join(&base);
        tokio::fs::create_dir_all(&pages_dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create output directory: {}", e)))?;

        debug!(
            "Job {}: rasterizing {} into {}",
            workspace.job_id,
            source.display(),
            pages_dir.display()
        );

        self.rasterizer
            .rasterize(&source, self.image_format, &pages_dir.join(&base))
            .await
            .map_err(AppError::Rasterization)?;

        let page_count = count_pages(&pages_dir, self.image_format)
            .await
            .map_err(|e| AppError::Rasterization(ToolError::Io(e)))?;
        if page_count == 0 {
            return Err(AppError::Rasterization(ToolError::NoOutput(
                "rasterizer".to_string(),
            )));
        }

        debug!("Job {}: {} pages rasterized", workspace.job_id, page_count);

        let built = output_root.join(format!("{}{}", base, ARCHIVE_SUFFIX));
        self.archiver
            .archive(&output_root, &base, &built)
            .await
            .map_err(AppError::Archiving)?;

        if !is_file(&built).await {
            return Err(AppError::Archiving(ToolError::NoOutput(
                "archiver".to_string(),
            )));
        }

        let archive = ArchiveRef::new(workspace.job_id, &base);
        self.layout
            .publish_archive(&built, &archive)
            .await
            .map_err(|e| AppError::Archiving(ToolError::Io(e)))?;

        info!(
            "Converted '{}' into {} ({} pages)",
            stored_name, archive, page_count
        );

        Ok(ConversionOutcome {
            archive,
            page_count,
        })
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Counts the page images the rasterizer left in `dir`
async fn count_pages(dir: &Path, format: ImageFormat) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_page = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(format.extension()));
        if is_page && entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
