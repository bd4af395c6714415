// External tool plumbing for ChatBridge
//
// Everything that touches a device tool or the staging filesystem lives here:
// executable lookup, bounded subprocess runs, detection output parsing, the
// source pull, the target restore and the media copy.

pub mod audit;
pub mod backup;
pub mod detect;
pub mod media;
pub mod tools;

pub use backup::{pull_source_backup, pulled_backup_path, restore_to_target};
pub use detect::{parse_adb_devices, parse_ideviceinfo_name};
pub use media::{MediaCopyReport, copy_media};
pub use tools::{ToolError, ToolLocator, ToolOutput, ToolSpec, run_tool};
