use crate::services::storage::{StorageLayout, WORKSPACE_PREFIX};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::sleep;

/// Removes archives nobody downloaded and workspaces left behind by a crash
pub struct BackgroundWorker {
    layout: Arc<StorageLayout>,
    retention: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        layout: Arc<StorageLayout>,
        retention: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            layout,
            retention,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    /// Returns the number of removed directories
    pub async fn perform_cleanup(&self) -> usize {
        tracing::debug!("🧹 Running retention sweep...");

        // 1. Expired archives
        let archives = self
            .sweep_dir(&self.layout.archives_root(), |_| true)
            .await;

        // 2. Orphaned workspaces
        let workspaces = self
            .sweep_dir(&self.layout.scratch_root(), |name| {
                name.starts_with(WORKSPACE_PREFIX)
            })
            .await;

        if archives + workspaces > 0 {
            tracing::info!(
                "✅ Retention sweep removed {} archives and {} stale workspaces",
                archives,
                workspaces
            );
        }

        archives + workspaces
    }

    async fn sweep_dir(&self, root: &Path, matches: impl Fn(&str) -> bool) -> usize {
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", root.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !matches(&name) {
                continue;
            }

            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or(Duration::ZERO);
            if age < self.retention {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => {
                    tracing::info!("Expired {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => tracing::error!("Failed to expire {}: {}", entry.path().display(), e),
            }
        }

        removed
    }
}
