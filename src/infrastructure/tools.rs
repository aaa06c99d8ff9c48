use crate::config::ConverterConfig;
use crate::services::tools::{Archiver, Rasterizer, create_archiver, create_rasterizer};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_tools(config: &ConverterConfig) -> (Arc<dyn Rasterizer>, Arc<dyn Archiver>) {
    let rasterizer = create_rasterizer(config);
    let archiver = create_archiver(config);

    if rasterizer.health_check().await {
        info!("🖨️  Rasterizer '{}' available", config.rasterizer_bin);
    } else {
        warn!(
            "⚠️  Rasterizer '{}' not found! Conversions will fail until it is installed.",
            config.rasterizer_bin
        );
    }

    if archiver.health_check().await {
        info!("📦 Archiver ready ({})", config.archiver_type);
    } else {
        warn!(
            "⚠️  Archiver '{}' not found! Conversions will fail until it is installed.",
            config.archiver_bin
        );
    }

    (rasterizer, archiver)
}
