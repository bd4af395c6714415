//! Device probes
//!
//! A probe answers one question: is a device of its class reachable right now?
//! Probes never fail. Every problem (missing tool, non-zero exit, timeout,
//! unparseable output) is reported as a disconnected status.

use async_trait::async_trait;
use chatbridge_common::{DeviceRole, DeviceStatus};
use chatbridge_helper::detect::{ADB_DEVICES_ARGS, IDEVICEINFO_NAME_ARGS};
use chatbridge_helper::{ToolLocator, ToolSpec, parse_adb_devices, parse_ideviceinfo_name, run_tool};
use std::time::Duration;

/// Detects presence of one device class
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    fn role(&self) -> DeviceRole;

    async fn probe(&self) -> DeviceStatus;
}

/// Turns successful tool output into device info, or `None` if no device is listed
pub type OutputParser = fn(&str) -> Option<String>;

/// Probe backed by an external detection tool
pub struct ToolProbe {
    role: DeviceRole,
    spec: ToolSpec,
    args: Vec<String>,
    parser: OutputParser,
    locator: ToolLocator,
    timeout: Duration,
}

impl ToolProbe {
    pub fn new(
        role: DeviceRole,
        spec: ToolSpec,
        args: &[&str],
        parser: OutputParser,
        locator: ToolLocator,
        timeout: Duration,
    ) -> Self {
        Self {
            role,
            spec,
            args: args.iter().map(|a| a.to_string()).collect(),
            parser,
            locator,
            timeout,
        }
    }

    /// Source probe using `adb devices -l`
    pub fn android(locator: ToolLocator, timeout: Duration) -> Self {
        Self::new(
            DeviceRole::Source,
            ToolSpec::adb(),
            ADB_DEVICES_ARGS,
            parse_adb_devices,
            locator,
            timeout,
        )
    }

    /// Target probe using `ideviceinfo -k DeviceName`
    pub fn ios(locator: ToolLocator, timeout: Duration) -> Self {
        Self::new(
            DeviceRole::Target,
            ToolSpec::ideviceinfo(),
            IDEVICEINFO_NAME_ARGS,
            parse_ideviceinfo_name,
            locator,
            timeout,
        )
    }
}

#[async_trait]
impl DeviceProbe for ToolProbe {
    fn role(&self) -> DeviceRole {
        self.role
    }

    async fn probe(&self) -> DeviceStatus {
        let path = match self.locator.locate(&self.spec).await {
            Ok(path) => path,
            Err(e) => {
                log::debug!("{} probe: {}", self.role, e);
                return DeviceStatus::unavailable(self.spec.not_found().to_string());
            }
        };

        let output = match run_tool(&path, self.args.as_slice(), self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                log::debug!("{} probe: {}", self.role, e);
                return DeviceStatus::disconnected();
            }
        };

        if !output.success {
            log::debug!(
                "{} probe: {} exited unsuccessfully: {}",
                self.role,
                path.display(),
                output.combined_output()
            );
            return DeviceStatus::disconnected();
        }

        match (self.parser)(&output.stdout) {
            Some(info) => DeviceStatus::connected(info),
            None => DeviceStatus::disconnected(),
        }
    }
}
