//! Bounds on configuration values

/// Default poll cadence (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Minimum poll cadence (1ms)
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Maximum poll cadence (60s)
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Maximum time a single run-loop service call may block (1s)
pub const MAX_RUN_TIMEOUT_MS: u64 = 1_000;

/// Maximum attribute name length (256 chars)
pub const MAX_ATTRIBUTE_LEN: usize = 256;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    PollIntervalOutOfRange { ms: u64, min: u64, max: u64 },
    RunTimeoutTooLong { ms: u64, max: u64 },
    AttributeTooLong { len: usize, max: usize },
    InvalidAttribute(String),
    EmptyAttribute,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PollIntervalOutOfRange { ms, min, max } => {
                write!(f, "Poll interval out of range: {}ms (min {}, max {})", ms, min, max)
            }
            Self::RunTimeoutTooLong { ms, max } => {
                write!(f, "Run-loop timeout too long: {}ms (max {})", ms, max)
            }
            Self::AttributeTooLong { len, max } => {
                write!(f, "Attribute name too long: {} chars (max {})", len, max)
            }
            Self::InvalidAttribute(name) => write!(f, "Invalid attribute name: {}", name),
            Self::EmptyAttribute => write!(f, "Attribute name cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate poll cadence
pub fn validate_poll_interval(ms: u64) -> Result<(), ValidationError> {
    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&ms) {
        return Err(ValidationError::PollIntervalOutOfRange {
            ms,
            min: MIN_POLL_INTERVAL_MS,
            max: MAX_POLL_INTERVAL_MS,
        });
    }
    Ok(())
}

/// Validate run-loop service timeout
pub fn validate_run_timeout(ms: u64) -> Result<(), ValidationError> {
    if ms > MAX_RUN_TIMEOUT_MS {
        return Err(ValidationError::RunTimeoutTooLong {
            ms,
            max: MAX_RUN_TIMEOUT_MS,
        });
    }
    Ok(())
}

/// Validate attribute name (ASCII identifier characters only)
pub fn validate_attribute(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyAttribute);
    }
    if name.len() > MAX_ATTRIBUTE_LEN {
        return Err(ValidationError::AttributeTooLong {
            len: name.len(),
            max: MAX_ATTRIBUTE_LEN,
        });
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
        return Err(ValidationError::InvalidAttribute(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_poll_interval() {
        assert!(validate_poll_interval(DEFAULT_POLL_INTERVAL_MS).is_ok());
        assert!(validate_poll_interval(0).is_err());
        assert!(validate_poll_interval(MAX_POLL_INTERVAL_MS + 1).is_err());
    }

    #[test]
    fn test_validate_run_timeout() {
        assert!(validate_run_timeout(0).is_ok());
        assert!(validate_run_timeout(5_000).is_err());
    }

    #[test]
    fn test_validate_attribute() {
        assert!(validate_attribute("kMDItemDisplayName").is_ok());
        assert!(validate_attribute("").is_err());
        assert!(validate_attribute("kMDItem Path").is_err());
        assert!(validate_attribute(&"x".repeat(300)).is_err());
    }
}
