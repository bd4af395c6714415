// ChatBridge - move chat history from an Android device to an iOS device
//
// The device monitor polls both devices; the transfer orchestrator runs the
// backup, extract, convert, media and restore stages once both are connected.

pub mod collaborators;
pub mod converter;
pub mod monitor;
pub mod orchestrator;
pub mod probe;

pub use collaborators::{AdbBackup, IdeviceRestore, SourceBackup, TargetRestore};
pub use converter::{FormatConverter, StagingConverter};
pub use monitor::DeviceMonitor;
pub use orchestrator::{
    Collaborators, GateError, PipelineTiming, TransferEvent, TransferOrchestrator,
};
pub use probe::{DeviceProbe, ToolProbe};
