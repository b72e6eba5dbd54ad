//! Column selection for transform operators.
//!
//! A selector is plain, serializable data. `Default` defers to the
//! operator's default variable kind; the other variants narrow the
//! selection. Resolution is always against the candidate columns visible at
//! the operator's position in a workflow, so the same selector can be reused
//! across schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ColumnName, ModelError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSelector {
    /// All candidate columns of the operator's default kind.
    Default,
    /// Exactly these columns; every name must be a candidate.
    Names(Vec<ColumnName>),
    /// Every candidate whose name starts with the given string.
    Prefix(String),
    /// Every candidate whose name ends with the given string.
    Suffix(String),
}

impl ColumnSelector {
    /// Whether this selector would act on `name`, ignoring candidacy.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Default => true,
            Self::Names(names) => names.iter().any(|n| n.as_str() == name),
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Suffix(suffix) => name.ends_with(suffix.as_str()),
        }
    }

    /// Resolve against the candidate columns, in candidate order.
    ///
    /// `Names` requires every listed column to be present. Pattern selectors
    /// and `Default` must match at least one candidate.
    pub fn resolve(&self, candidates: &[ColumnName]) -> Result<Vec<ColumnName>, ModelError> {
        if let Self::Names(names) = self {
            let missing: Vec<String> = names
                .iter()
                .filter(|n| !candidates.contains(*n))
                .map(ToString::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(ModelError::UnknownColumns { missing });
            }
            // Preserve the declared order for explicit selections.
            return Ok(names.clone());
        }

        let selected: Vec<ColumnName> = candidates
            .iter()
            .filter(|c| self.matches(c.as_str()))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(ModelError::EmptySelection {
                selector: self.to_string(),
                candidates: candidates.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(selected)
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Names(names) => {
                let joined: Vec<&str> = names.iter().map(ColumnName::as_str).collect();
                write!(f, "[{}]", joined.join(", "))
            }
            Self::Prefix(prefix) => write!(f, "prefix:{prefix}"),
            Self::Suffix(suffix) => write!(f, "suffix:{suffix}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnName> {
        names.iter().map(|n| ColumnName::new(*n).unwrap()).collect()
    }

    #[test]
    fn default_selects_all_candidates() {
        let candidates = cols(&["a", "b"]);
        let selected = ColumnSelector::Default.resolve(&candidates).unwrap();
        assert_eq!(selected, candidates);
    }

    #[test]
    fn names_must_all_be_candidates() {
        let candidates = cols(&["a", "b"]);
        let selector = ColumnSelector::Names(cols(&["a", "z"]));
        let err = selector.resolve(&candidates).unwrap_err();
        match err {
            ModelError::UnknownColumns { missing } => assert_eq!(missing, vec!["z"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn names_keep_declared_order() {
        let candidates = cols(&["a", "b", "c"]);
        let selector = ColumnSelector::Names(cols(&["c", "a"]));
        let selected = selector.resolve(&candidates).unwrap();
        assert_eq!(selected, cols(&["c", "a"]));
    }

    #[test]
    fn suffix_matching_no_hits_is_an_error() {
        let candidates = cols(&["user_age", "item_rating"]);
        let hit = ColumnSelector::Suffix("_age".to_string())
            .resolve(&candidates)
            .unwrap();
        assert_eq!(hit, cols(&["user_age"]));
        let err = ColumnSelector::Prefix("zz".to_string())
            .resolve(&candidates)
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptySelection { .. }));
    }

    #[test]
    fn default_with_no_candidates_is_an_error() {
        let err = ColumnSelector::Default.resolve(&[]).unwrap_err();
        assert!(matches!(err, ModelError::EmptySelection { .. }));
    }
}
