//! Identifier validation and quoting for generated SQL.
//!
//! The profiler never embeds caller text in a query directly. Table identifiers
//! are validated here and then resolved against the catalog; column identifiers
//! only ever come from the discovered schema. Both are quoted before they reach
//! the query builder.

use crate::error::{ProfileError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum accepted length for a caller-supplied identifier segment.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// SQL identifier validation and quoting utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Quotes an identifier with double quotes, doubling any embedded quote.
    ///
    /// Quoted identifiers keep their exact case, which matters because catalog
    /// names are compared verbatim.
    ///
    /// # Examples
    /// ```rust
    /// use term_profiler::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("order id").unwrap(), "\"order id\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::quote_identifier("bad\0name").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        if identifier.is_empty() {
            return Err(ProfileError::SecurityError(
                "SQL identifier cannot be empty".to_string(),
            ));
        }
        if identifier.contains('\0') {
            return Err(ProfileError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates a caller-supplied identifier segment (catalog, schema or table).
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() || identifier.trim().is_empty() {
            return Err(ProfileError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ProfileError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.chars().any(char::is_control) {
            return Err(ProfileError::SecurityError(
                "SQL identifier cannot contain control characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a segment of a dotted `schema.table` path.
    ///
    /// Dotted paths are split before resolution, so segments are restricted to
    /// plain identifiers. Names with spaces or punctuation can still be profiled
    /// through [`TableIdentifier::new`](crate::schema::TableIdentifier::new).
    pub fn validate_path_segment(segment: &str) -> Result<()> {
        Self::validate_identifier(segment)?;

        static SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
            // This regex is compile-time constant and known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !SEGMENT_REGEX.is_match(segment) {
            return Err(ProfileError::SecurityError(format!(
                "Invalid identifier segment '{segment}'. Segments must start with a letter or underscore and contain only letters, numbers, underscores and '$'"
            )));
        }

        Ok(())
    }
}
