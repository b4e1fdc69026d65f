// Settings validation

use crate::{ConfigError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Reject zero for counts and intervals that must make progress.
    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive() {
        assert!(ConfigValidator::positive(1, "limit").is_ok());
        let err = ConfigValidator::positive(0, "limit").unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_not_empty() {
        assert!(ConfigValidator::not_empty("crm", "prefix").is_ok());
        assert!(ConfigValidator::not_empty("  ", "prefix").is_err());
    }
}
