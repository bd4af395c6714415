//! Transfer pipeline model
//!
//! Stages, the observable transfer state, the pipeline error taxonomy and the
//! on-disk staging layout shared by the orchestrator and its collaborators.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Status message shown before any transfer has run
pub const READY_STATUS: &str = "Ready to transfer";

/// Status message shown while a new attempt is being set up
pub const STARTING_STATUS: &str = "Starting transfer...";

/// Status message shown after any stage fails
pub const FAILED_STATUS: &str = "Transfer failed";

/// Ordered stages of a transfer attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    BackupSource,
    ExtractSource,
    ConvertFormat,
    TransferMedia,
    RestoreTarget,
    Complete,
}

impl PipelineStage {
    /// Every stage in execution order
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::BackupSource,
        PipelineStage::ExtractSource,
        PipelineStage::ConvertFormat,
        PipelineStage::TransferMedia,
        PipelineStage::RestoreTarget,
        PipelineStage::Complete,
    ];

    /// Progress value published once this stage has finished
    pub fn progress(&self) -> f64 {
        match self {
            PipelineStage::BackupSource => 0.1,
            PipelineStage::ExtractSource => 0.3,
            PipelineStage::ConvertFormat => 0.5,
            PipelineStage::TransferMedia => 0.7,
            PipelineStage::RestoreTarget => 0.9,
            PipelineStage::Complete => 1.0,
        }
    }

    pub fn step_label(&self) -> &'static str {
        match self {
            PipelineStage::BackupSource => "Backing up source data...",
            PipelineStage::ExtractSource => "Extracting source database...",
            PipelineStage::ConvertFormat => "Converting database format...",
            PipelineStage::TransferMedia => "Transferring media files...",
            PipelineStage::RestoreTarget => "Restoring to target device...",
            PipelineStage::Complete => "Transfer complete!",
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            PipelineStage::BackupSource => "Connecting to source device...",
            PipelineStage::ExtractSource => "Processing source backup...",
            PipelineStage::ConvertFormat => "Converting source database to target format...",
            PipelineStage::TransferMedia => "Copying photos, videos, and documents...",
            PipelineStage::RestoreTarget => "Writing data to target device...",
            PipelineStage::Complete => "Data successfully transferred",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PipelineStage::BackupSource => "backup_source",
            PipelineStage::ExtractSource => "extract_source",
            PipelineStage::ConvertFormat => "convert_format",
            PipelineStage::TransferMedia => "transfer_media",
            PipelineStage::RestoreTarget => "restore_target",
            PipelineStage::Complete => "complete",
        }
    }
}

/// Errors raised by a format converter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Encrypted database: {0}")]
    EncryptedDatabase(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
}

impl ConversionError {
    /// The diagnostic message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            ConversionError::DatabaseNotFound(msg)
            | ConversionError::EncryptedDatabase(msg)
            | ConversionError::ConversionFailed(msg) => msg,
        }
    }
}

/// Errors that abort a transfer attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Source backup failed: {0}")]
    SourceBackupFailed(String),

    #[error("Backup not found at: {}", .0.display())]
    BackupNotFound(PathBuf),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Target restore failed: {0}")]
    TargetRestoreFailed(String),
}

/// Flat classification of [`TransferError`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    SourceBackupFailed,
    BackupNotFound,
    DatabaseNotFound,
    EncryptedDatabase,
    ConversionFailed,
    TargetRestoreFailed,
}

impl TransferError {
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            TransferError::SourceBackupFailed(_) => TransferErrorKind::SourceBackupFailed,
            TransferError::BackupNotFound(_) => TransferErrorKind::BackupNotFound,
            TransferError::Conversion(ConversionError::DatabaseNotFound(_)) => {
                TransferErrorKind::DatabaseNotFound
            }
            TransferError::Conversion(ConversionError::EncryptedDatabase(_)) => {
                TransferErrorKind::EncryptedDatabase
            }
            TransferError::Conversion(ConversionError::ConversionFailed(_)) => {
                TransferErrorKind::ConversionFailed
            }
            TransferError::TargetRestoreFailed(_) => TransferErrorKind::TargetRestoreFailed,
        }
    }

    /// Stage that raises this kind of error
    pub fn stage(&self) -> PipelineStage {
        match self {
            TransferError::SourceBackupFailed(_) => PipelineStage::BackupSource,
            TransferError::BackupNotFound(_) => PipelineStage::ExtractSource,
            TransferError::Conversion(_) => PipelineStage::ConvertFormat,
            TransferError::TargetRestoreFailed(_) => PipelineStage::RestoreTarget,
        }
    }
}

/// Observable state of the transfer orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct TransferState {
    pub running: bool,
    /// 0.0 to 1.0, non-decreasing within an attempt
    pub progress: f64,
    pub current_step: String,
    pub status_message: String,
    pub last_error: Option<TransferError>,
}

impl Default for TransferState {
    fn default() -> Self {
        Self {
            running: false,
            progress: 0.0,
            current_step: String::new(),
            status_message: READY_STATUS.to_string(),
            last_error: None,
        }
    }
}

impl TransferState {
    /// Reset for a fresh attempt and mark it running
    pub fn begin_attempt(&mut self) {
        self.running = true;
        self.progress = 0.0;
        self.current_step.clear();
        self.status_message = STARTING_STATUS.to_string();
        self.last_error = None;
    }

    /// Record that a stage finished
    pub fn apply_stage(&mut self, stage: PipelineStage) {
        self.progress = self.progress.max(stage.progress());
        self.current_step = stage.step_label().to_string();
        self.status_message = stage.status_label().to_string();
    }

    /// Stop the attempt with an error; progress and step stay where they were
    pub fn fail(&mut self, error: TransferError) {
        self.running = false;
        self.last_error = Some(error);
        self.status_message = FAILED_STATUS.to_string();
    }

    pub fn finish(&mut self) {
        self.running = false;
    }
}

/// Directory layout used during a transfer
///
/// ```text
/// <root>/
///   source_backup/   data pulled from the source device
///   converted/       target-format output and copied media
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    pub root: PathBuf,
    pub source_backup: PathBuf,
    pub converted: PathBuf,
}

impl StagingLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            source_backup: root.join("source_backup"),
            converted: root.join("converted"),
            root,
        }
    }
}
