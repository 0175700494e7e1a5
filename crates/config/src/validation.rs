//! Validation for configuration sections
//!
//! Each section implements [`ConfigSection`]; [`Validator`] holds the
//! shared field checks.

pub use crate::error::ValidationError;

/// A config section that can validate and merge itself
pub trait ConfigSection: Default {
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Values from `other` take precedence
    fn merge(&mut self, other: Self);

    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Inclusive range check
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    pub fn at_least<T>(value: T, min: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min {
            Err(ValidationError::with_value(
                field,
                format!("must be at least {}", min),
                value,
            ))
        } else {
            Ok(())
        }
    }

    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Requires an absolute http(s) URL
    pub fn http_url(value: &str, field: &str) -> Result<(), ValidationError> {
        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(ValidationError::with_value(
                field,
                "must be an http(s) URL",
                value,
            )),
        }
    }

    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range() {
        assert!(Validator::in_range(0.5, 0.0, 1.0, "test").is_ok());
        assert!(Validator::in_range(0.0, 0.0, 1.0, "test").is_ok());
        assert!(Validator::in_range(1.0, 0.0, 1.0, "test").is_ok());
        assert!(Validator::in_range(-0.1, 0.0, 1.0, "test").is_err());
        assert!(Validator::in_range(1.1, 0.0, 1.0, "test").is_err());
    }

    #[test]
    fn test_at_least() {
        assert!(Validator::at_least(1u32, 1, "test").is_ok());
        let err = Validator::at_least(0u32, 1, "retry.max_attempts").unwrap_err();
        assert_eq!(err.value.as_deref(), Some("0"));
    }

    #[test]
    fn test_not_empty() {
        assert!(Validator::not_empty("repolens.db", "test").is_ok());
        assert!(Validator::not_empty("   ", "test").is_err());
    }

    #[test]
    fn test_http_url() {
        assert!(Validator::http_url("https://api.github.com", "test").is_ok());
        assert!(Validator::http_url("http://localhost:8080", "test").is_ok());
        assert!(Validator::http_url("https://", "test").is_err());
        assert!(Validator::http_url("api.github.com", "test").is_err());
    }

    #[test]
    fn test_collect_errors() {
        assert!(Validator::collect_errors(vec![Ok(()), Ok(())]).is_ok());

        let result = Validator::collect_errors(vec![
            Ok(()),
            Err(ValidationError::new("field1", "error1")),
            Err(ValidationError::new("field2", "error2")),
        ]);
        assert_eq!(result.unwrap_err().len(), 2);
    }
}
