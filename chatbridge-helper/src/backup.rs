//! Source backup and target restore operations
//!
//! Both operations shell out to device tools with fixed argument lists. The
//! caller supplies the resolved tool path so tests can substitute their own.

use anyhow::{Context, Result, anyhow, bail};
use chatbridge_common::{SOURCE_APP_DATA_PATH, StagingLayout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audit;
use crate::tools::run_tool;

/// Where `adb pull` places the application directory inside the staging tree
pub fn pulled_backup_path(layout: &StagingLayout) -> PathBuf {
    let app_dir = Path::new(SOURCE_APP_DATA_PATH)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("app_data"));

    layout.source_backup.join(app_dir)
}

/// Pull the application data directory from the source device
///
/// Creates `<root>/source_backup`, removes data left by an earlier pull, runs
/// `adb pull <app data> <source_backup>` and returns the path the data is
/// expected at. The path is not checked here; verifying it is a separate
/// pipeline step.
pub async fn pull_source_backup(
    adb: &Path,
    layout: &StagingLayout,
    timeout: Duration,
) -> Result<PathBuf> {
    let pulled = pulled_backup_path(layout);
    let staging_dir = layout.source_backup.clone();

    tokio::task::spawn_blocking(move || prepare_staging(&staging_dir, &pulled))
        .await
        .context("Staging preparation task failed")??;

    let destination = layout.source_backup.to_string_lossy().to_string();
    let args = ["pull", SOURCE_APP_DATA_PATH, destination.as_str()];

    log::info!("Pulling {} into {}", SOURCE_APP_DATA_PATH, destination);

    let output = run_tool(adb, &args, timeout).await;
    audit::log_tool_invocation(adb, &args, output.as_ref().map(|o| o.success).unwrap_or(false));

    let output = output.context("Failed to run adb pull")?;
    if !output.success {
        bail!("Failed to backup from source device: {}", output.combined_output());
    }

    Ok(pulled_backup_path(layout))
}

fn prepare_staging(staging_dir: &Path, pulled: &Path) -> Result<()> {
    std::fs::create_dir_all(staging_dir).with_context(|| {
        format!(
            "Failed to create staging directory {}",
            staging_dir.display()
        )
    })?;

    if pulled.exists() {
        log::info!("Removing previous backup at {}", pulled.display());
        std::fs::remove_dir_all(pulled)
            .with_context(|| format!("Failed to remove previous backup {}", pulled.display()))?;
    }

    Ok(())
}

/// Restore a converted backup directory onto the target device
///
/// Runs `idevicebackup2 restore <converted>`.
pub async fn restore_to_target(tool: &Path, converted: &Path, timeout: Duration) -> Result<()> {
    if !converted.is_dir() {
        return Err(anyhow!(
            "Converted backup does not exist: {}",
            converted.display()
        ));
    }

    let converted_arg = converted.to_string_lossy().to_string();
    let args = ["restore", converted_arg.as_str()];

    log::info!("Restoring {} onto target device", converted_arg);

    let output = run_tool(tool, &args, timeout).await;
    audit::log_tool_invocation(tool, &args, output.as_ref().map(|o| o.success).unwrap_or(false));

    let output = output.context("Failed to run restore tool")?;
    if !output.success {
        bail!("Failed to restore to target device: {}", output.combined_output());
    }

    Ok(())
}
