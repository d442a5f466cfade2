// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.is_empty() {
            return Err(ConfigError::ValidationError(format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    pub fn in_range<T: PartialOrd + std::fmt::Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {} (got {})",
                field, min, max, value
            )));
        }
        Ok(())
    }

    pub fn min_len(value: &[u8], min: usize, field: &str) -> Result<()> {
        if value.len() < min {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at least {} bytes",
                field, min
            )));
        }
        Ok(())
    }

    /// Validate an RFC 6265 cookie or header token (no separators, controls or spaces).
    pub fn is_token(value: &str, field: &str) -> Result<()> {
        Self::not_empty(value, field)?;
        let separator = |c: char| {
            c.is_ascii_control()
                || c.is_whitespace()
                || !c.is_ascii()
                || "()<>@,;:\\\"/[]?={}".contains(c)
        };
        if value.chars().any(separator) {
            return Err(ConfigError::ValidationError(format!(
                "{} contains characters not allowed in a cookie or header name",
                field
            )));
        }
        Ok(())
    }
}
