// Shared types and utilities for ChatBridge

pub mod config;
pub mod format;
pub mod pipeline;
pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use config::ChatbridgeConfig;
pub use format::{format_bytes, format_elapsed_time, format_percent};
pub use pipeline::{
    ConversionError, PipelineStage, StagingLayout, TransferError, TransferErrorKind, TransferState,
};
pub use validation::{ValidationError, ValidationResult, validate_tool_name};

/// Application data directory pulled from the source device
pub const SOURCE_APP_DATA_PATH: &str = "/sdcard/Android/media/com.whatsapp";

/// Media subdirectories copied from the source backup into the converted output
pub const MEDIA_SUBDIRS: &[&str] = &["Media", "Backups"];

/// Which side of the transfer a device plays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// The device data is migrated from (Android)
    Source,
    /// The device receiving the migrated data (iOS)
    Target,
}

impl DeviceRole {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceRole::Source => "source",
            DeviceRole::Target => "target",
        }
    }
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status of one device class, recomputed on every poll
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceStatus {
    pub connected: bool,
    /// Model or device name when connected, or a hint when tooling is missing
    pub info: Option<String>,
}

impl DeviceStatus {
    pub fn connected(info: impl Into<String>) -> Self {
        Self {
            connected: true,
            info: Some(info.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            info: None,
        }
    }

    /// Disconnected, with a diagnostic message for the user
    pub fn unavailable(hint: impl Into<String>) -> Self {
        Self {
            connected: false,
            info: Some(hint.into()),
        }
    }
}

/// Both device statuses as produced by a single refresh
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub source: DeviceStatus,
    pub target: DeviceStatus,
    /// When this snapshot was taken (None before the first refresh)
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn status(&self, role: DeviceRole) -> &DeviceStatus {
        match role {
            DeviceRole::Source => &self.source,
            DeviceRole::Target => &self.target,
        }
    }

    /// Whether both devices are reachable
    pub fn ready_for_transfer(&self) -> bool {
        self.source.connected && self.target.connected
    }

    /// Describe a connected device for the orchestrator
    pub fn descriptor(&self, role: DeviceRole) -> Option<DeviceDescriptor> {
        let status = self.status(role);
        if !status.connected {
            return None;
        }

        Some(DeviceDescriptor {
            role,
            info: status
                .info
                .clone()
                .unwrap_or_else(|| format!("{role} device")),
        })
    }
}

/// A connected device handed to the transfer orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub role: DeviceRole,
    pub info: String,
}

impl DeviceDescriptor {
    pub fn new(role: DeviceRole, info: impl Into<String>) -> Self {
        Self {
            role,
            info: info.into(),
        }
    }
}
