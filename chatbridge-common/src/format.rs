//! Formatting helpers for progress output and log lines

use std::time::Duration;

/// Format a byte count using binary units
///
/// # Examples
/// ```
/// use chatbridge_common::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KiB");
/// assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }

    format!("{size:.1} {unit}")
}

/// Format how long a transfer took
///
/// # Examples
/// ```
/// use chatbridge_common::format_elapsed_time;
/// use std::time::Duration;
/// assert_eq!(format_elapsed_time(Duration::from_millis(800)), "0.8s");
/// assert_eq!(format_elapsed_time(Duration::from_secs(95)), "1m 35s");
/// assert_eq!(format_elapsed_time(Duration::from_secs(3720)), "1h 2m");
/// ```
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();

    if secs < 60 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Render a 0.0..=1.0 progress value as a whole percentage
pub fn format_percent(progress: f64) -> String {
    format!("{:.0}%", progress.clamp(0.0, 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KiB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(format_elapsed_time(Duration::ZERO), "0.0s");
        assert_eq!(format_elapsed_time(Duration::from_secs(59)), "59.0s");
        assert_eq!(format_elapsed_time(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_elapsed_time(Duration::from_secs(7200)), "2h 0m");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.0), "0%");
        assert_eq!(format_percent(0.3), "30%");
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(1.7), "100%");
    }
}
