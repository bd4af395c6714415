//! Parsers for device detection tool output

/// Arguments for listing Android devices with their properties
pub const ADB_DEVICES_ARGS: &[&str] = &["devices", "-l"];

/// Arguments for reading the name of the attached iOS device
pub const IDEVICEINFO_NAME_ARGS: &[&str] = &["-k", "DeviceName"];

/// Info shown for an Android device that reports no model
pub const GENERIC_SOURCE_INFO: &str = "Android device connected";

/// Parse `adb devices -l` output
///
/// Returns a description of the first device in the `device` state, or `None`
/// when no ready device is listed. Devices that are `unauthorized` or `offline`
/// are not considered connected.
///
/// ```text
/// List of devices attached
/// 0123456789ABCDEF       device usb:1-1 product:panther model:Pixel_7 device:panther transport_id:2
/// ```
pub fn parse_adb_devices(output: &str) -> Option<String> {
    let line = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices"))
        .find(|line| line.split_whitespace().nth(1) == Some("device"))?;

    let info = line
        .split_whitespace()
        .find_map(|token| token.strip_prefix("model:"))
        .filter(|model| !model.is_empty())
        .map(|model| format!("Model: {model}"))
        .unwrap_or_else(|| GENERIC_SOURCE_INFO.to_string());

    Some(info)
}

/// Parse `ideviceinfo -k DeviceName` output
pub fn parse_ideviceinfo_name(output: &str) -> Option<String> {
    let name = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    Some(format!("Device: {name}"))
}
