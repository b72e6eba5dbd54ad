use std::fmt;

use crate::ModelError;

/// A validated dataset column name: trimmed and non-empty.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ColumnName(String);

impl ColumnName {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ModelError::InvalidColumnName(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a new name by appending `_<suffix>`.
    ///
    /// Used for operators that keep the original column and write their
    /// output alongside it.
    pub fn suffixed(&self, suffix: &str) -> Self {
        Self(format!("{}_{}", self.0, suffix))
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ColumnName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_name_trims_and_rejects_empty() {
        assert_eq!(ColumnName::new("  user_age ").unwrap().as_str(), "user_age");
        assert!(ColumnName::new("").is_err());
        assert!(ColumnName::new("   ").is_err());
    }

    #[test]
    fn suffixed_appends_with_underscore() {
        let name = ColumnName::new("timestamp").unwrap();
        assert_eq!(name.suffixed("log").as_str(), "timestamp_log");
    }

    #[test]
    fn serializes_as_plain_string() {
        let name = ColumnName::new("uid").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"uid\"");
    }
}
