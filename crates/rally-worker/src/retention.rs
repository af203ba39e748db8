//! Periodic cleanup of served output videos.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;

const OUTPUT_SUFFIX: &str = "_annotated.mp4";

/// Deletes annotated outputs older than the retention window, then the
/// oldest beyond the file cap.
#[derive(Debug, Clone)]
pub struct OutputSweeper {
    dir: PathBuf,
    retention: Duration,
    max_files: usize,
    interval: Duration,
}

impl OutputSweeper {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            dir: config.output_dir.clone(),
            retention: config.output_retention,
            max_files: config.output_max_files,
            interval: config.sweep_interval,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.retention.is_zero()
    }

    /// Run one sweep. Returns the number of files removed.
    pub async fn sweep_once(&self) -> std::io::Result<usize> {
        let now = SystemTime::now();
        let mut outputs: Vec<(SystemTime, PathBuf)> = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_output = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(OUTPUT_SUFFIX));
            if !is_output {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            outputs.push((modified, path));
        }

        // Newest first, so everything past the cap is the oldest.
        outputs.sort_by(|a, b| b.0.cmp(&a.0));

        let mut removed = 0;
        for (index, (modified, path)) in outputs.iter().enumerate() {
            let age = now.duration_since(*modified).unwrap_or_default();
            if age <= self.retention && index < self.max_files {
                continue;
            }
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Removed output");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), "Failed to remove output: {}", e),
            }
        }

        if removed > 0 {
            info!(removed, kept = outputs.len() - removed, "Output sweep finished");
        }
        Ok(removed)
    }

    /// Sweep every interval until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.is_enabled() {
            info!("Output retention disabled");
            return;
        }
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(dir = %self.dir.display(), "Output sweep failed: {}", e);
                    }
                }
            }
        }
        debug!("Output sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweeper(dir: &std::path::Path, retention: Duration, max_files: usize) -> OutputSweeper {
        OutputSweeper::new(&WorkerConfig {
            output_dir: dir.to_path_buf(),
            output_retention: retention,
            output_max_files: max_files,
            ..WorkerConfig::default()
        })
    }

    #[tokio::test]
    async fn test_cap_removes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.path().join(format!("{}_annotated.mp4", name)), b"x").unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let removed = sweeper(dir.path(), Duration::from_secs(3600), 2)
            .sweep_once()
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("a_annotated.mp4").exists());
        assert!(dir.path().join("c_annotated.mp4").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_expired_outputs_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old_annotated.mp4"), b"x").unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let removed = sweeper(dir.path(), Duration::from_millis(1), 100)
            .sweep_once()
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_zero_retention_disables() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!sweeper(dir.path(), Duration::ZERO, 10).is_enabled());
    }
}
