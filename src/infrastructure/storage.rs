use crate::config::ConverterConfig;
use crate::services::storage::StorageLayout;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &ConverterConfig) -> anyhow::Result<Arc<StorageLayout>> {
    let layout = StorageLayout::new(&config.work_dir);
    layout.ensure().await?;

    info!(
        "📁 Working directory: {} (scratch: {}, archives: {})",
        layout.root().display(),
        layout.scratch_root().display(),
        layout.archives_root().display()
    );

    Ok(Arc::new(layout))
}
