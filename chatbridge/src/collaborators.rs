//! Device-side collaborators of the transfer pipeline

use anyhow::Result;
use async_trait::async_trait;
use chatbridge_common::StagingLayout;
use chatbridge_helper::{ToolLocator, ToolSpec, pull_source_backup, restore_to_target};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pulls the application data off the source device
#[async_trait]
pub trait SourceBackup: Send + Sync {
    /// Pull into the staging layout and return the staging path of the data
    async fn backup(&self, layout: &StagingLayout) -> Result<PathBuf>;
}

/// Writes a converted backup onto the target device
#[async_trait]
pub trait TargetRestore: Send + Sync {
    async fn restore(&self, converted: &Path) -> Result<()>;
}

/// [`SourceBackup`] using `adb pull`
pub struct AdbBackup {
    locator: ToolLocator,
    timeout: Duration,
}

impl AdbBackup {
    pub fn new(locator: ToolLocator, timeout: Duration) -> Self {
        Self { locator, timeout }
    }
}

#[async_trait]
impl SourceBackup for AdbBackup {
    async fn backup(&self, layout: &StagingLayout) -> Result<PathBuf> {
        let adb = self.locator.locate(&ToolSpec::adb()).await?;
        pull_source_backup(&adb, layout, self.timeout).await
    }
}

/// [`TargetRestore`] using `idevicebackup2 restore`
pub struct IdeviceRestore {
    locator: ToolLocator,
    timeout: Duration,
}

impl IdeviceRestore {
    pub fn new(locator: ToolLocator, timeout: Duration) -> Self {
        Self { locator, timeout }
    }
}

#[async_trait]
impl TargetRestore for IdeviceRestore {
    async fn restore(&self, converted: &Path) -> Result<()> {
        let tool = self.locator.locate(&ToolSpec::idevicebackup2()).await?;
        restore_to_target(&tool, converted, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_restore_of_missing_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let restore = IdeviceRestore::new(
            ToolLocator::with_search_dirs(vec![dir.path().to_path_buf()]),
            Duration::from_secs(1),
        );

        // Fails on lookup when the tool is absent, on the directory check otherwise
        let result = restore.restore(&dir.path().join("converted")).await;
        assert!(result.is_err());
    }
}
