//! Validation utilities
//!
//! Configuration checks and the allow-list applied to tool names before they are
//! used in any executable lookup.

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validation result
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Maximum accepted length of a tool name
const MAX_TOOL_NAME_LEN: usize = 64;

/// Validate an executable name before searching for it on disk
///
/// Names must start with an ASCII letter or digit and may only contain ASCII
/// letters, digits, `.`, `_` and `-`. This keeps path separators, whitespace and
/// shell metacharacters out of every lookup.
///
/// # Examples
/// ```
/// # use chatbridge_common::validation::validate_tool_name;
/// assert!(validate_tool_name("adb").is_ok());
/// assert!(validate_tool_name("ideviceinfo").is_ok());
/// assert!(validate_tool_name("../adb").is_err());
/// assert!(validate_tool_name("adb; rm -rf /").is_err());
/// ```
pub fn validate_tool_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Tool name cannot be empty".to_string());
    }

    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(format!(
            "Tool name too long (max {MAX_TOOL_NAME_LEN} characters)"
        ));
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err("Tool name must start with a letter or digit".to_string());
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
        return Err(
            "Tool name can only contain letters, numbers, dots, dashes, and underscores"
                .to_string(),
        );
    }

    Ok(())
}
