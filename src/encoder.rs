use crate::records::RecordError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Category every unseen value is mapped to under `UnseenPolicy::Remap`.
pub const FALLBACK_CATEGORY: &str = "Unknown";

/// What `encode` does with a value outside the fitted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnseenPolicy {
    #[default]
    Remap,
    Reject,
}

/// Text category <-> integer code table for one field.
///
/// Codes are assigned once at fit time: observed values in lexicographic
/// order, then `FALLBACK_CATEGORY` appended if the corpus never contained it.
/// An appended fallback holds a code but is not part of the known set, so an
/// incoming `"Unknown"` is treated like any other unseen value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    field: String,
    classes: Vec<String>,
    observed: usize,
    fallback: usize,
}

impl CategoricalEncoder {
    /// Returns `None` when `values` is empty.
    pub fn fit<'a, I>(field: &str, values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let observed: BTreeSet<&str> = values.into_iter().map(str::trim).collect();
        if observed.is_empty() {
            return None;
        }
        let mut classes: Vec<String> = observed.into_iter().map(String::from).collect();
        let observed = classes.len();
        let fallback = match classes.iter().position(|c| c == FALLBACK_CATEGORY) {
            Some(code) => code,
            None => {
                classes.push(FALLBACK_CATEGORY.to_string());
                classes.len() - 1
            }
        };
        Some(Self {
            field: field.to_string(),
            classes,
            observed,
            fallback,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Values seen in the training corpus, in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes[..self.observed.min(self.classes.len())]
    }

    /// Whether the fallback code was appended rather than observed.
    pub fn has_synthetic_fallback(&self) -> bool {
        self.fallback >= self.observed
    }

    /// Internal consistency of a deserialized table.
    pub(crate) fn is_consistent(&self) -> bool {
        self.observed > 0
            && self.observed <= self.classes.len()
            && self.fallback < self.classes.len()
            && self.classes[self.fallback] == FALLBACK_CATEGORY
    }

    pub fn fallback_code(&self) -> usize {
        self.fallback
    }

    /// Strict lookup.
    pub fn code_of(&self, value: &str) -> Option<usize> {
        let value = value.trim();
        self.classes().iter().position(|c| c == value)
    }

    pub fn encode(&self, value: &str, policy: UnseenPolicy) -> Result<usize, RecordError> {
        match (self.code_of(value), policy) {
            (Some(code), _) => Ok(code),
            (None, UnseenPolicy::Remap) => {
                log::warn!(
                    "unseen {} value '{}' remapped to '{}'",
                    self.field,
                    value,
                    FALLBACK_CATEGORY
                );
                Ok(self.fallback)
            }
            (None, UnseenPolicy::Reject) => Err(RecordError::UnseenCategory {
                field: self.field.clone(),
                value: value.to_string(),
            }),
        }
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}
