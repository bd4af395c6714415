//! Source-to-target database conversion

use async_trait::async_trait;
use chatbridge_common::ConversionError;
use std::path::{Path, PathBuf};

/// Chat database inside the pulled source backup
pub const SOURCE_DATABASE: &str = "Databases/msgstore.db";

/// File name of the database written into the converted output
pub const TARGET_DATABASE: &str = "ChatStorage.sqlite";

/// Suffixes of encrypted source database exports
const ENCRYPTED_SUFFIXES: &[&str] = &["crypt12", "crypt14", "crypt15"];

const ENCRYPTED_MESSAGE: &str = "Database is encrypted. Please decrypt it first using the key file.";

/// Converts a staged source backup into the target format
#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// Convert the backup at `staging` and return the converted directory
    async fn convert(&self, staging: &Path) -> Result<PathBuf, ConversionError>;
}

/// Converter that carries the source database into the converted directory
///
/// The database is copied as-is under the target file name. Schema
/// translation is not performed.
pub struct StagingConverter {
    output_dir: PathBuf,
}

impl StagingConverter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl FormatConverter for StagingConverter {
    async fn convert(&self, staging: &Path) -> Result<PathBuf, ConversionError> {
        let staging = staging.to_path_buf();
        let output_dir = self.output_dir.clone();

        tokio::task::spawn_blocking(move || convert_blocking(&staging, &output_dir))
            .await
            .map_err(|e| ConversionError::ConversionFailed(format!("Conversion task failed: {e}")))?
    }
}

fn convert_blocking(staging: &Path, output_dir: &Path) -> Result<PathBuf, ConversionError> {
    let database = staging.join(SOURCE_DATABASE);

    if !database.is_file() {
        if has_encrypted_copy(&database) {
            return Err(ConversionError::EncryptedDatabase(ENCRYPTED_MESSAGE.to_string()));
        }
        return Err(ConversionError::DatabaseNotFound(format!(
            "Chat database not found at: {}",
            database.display()
        )));
    }

    // Output from an earlier attempt must not leak into this one
    if output_dir.is_dir() {
        std::fs::remove_dir_all(output_dir).map_err(|e| {
            ConversionError::ConversionFailed(format!(
                "Failed to clear {}: {}",
                output_dir.display(),
                e
            ))
        })?;
    }

    std::fs::create_dir_all(output_dir).map_err(|e| {
        ConversionError::ConversionFailed(format!(
            "Failed to create {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    let converted = output_dir.join(TARGET_DATABASE);
    let bytes = std::fs::copy(&database, &converted).map_err(|e| {
        ConversionError::ConversionFailed(format!(
            "Failed to write {}: {}",
            converted.display(),
            e
        ))
    })?;

    log::info!(
        "Converted {} into {} ({})",
        database.display(),
        converted.display(),
        chatbridge_common::format_bytes(bytes)
    );

    Ok(output_dir.to_path_buf())
}

fn has_encrypted_copy(database: &Path) -> bool {
    ENCRYPTED_SUFFIXES.iter().any(|suffix| {
        let mut name = database.as_os_str().to_os_string();
        name.push(".");
        name.push(suffix);
        Path::new(&name).is_file()
    })
}
