use std::fmt::Display;

use super::recommendation::{CATEGORY_ID_KEY, PRODUCT_ID_KEY, SUGGESTION_ID_KEY};

/// Recommendation fields that can be used in equality lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationField {
    ProductId,
    SuggestionId,
    CategoryId,
}

impl RecommendationField {
    /// Key of the field in stored documents
    pub const fn key(self) -> &'static str {
        match self {
            RecommendationField::ProductId => PRODUCT_ID_KEY,
            RecommendationField::SuggestionId => SUGGESTION_ID_KEY,
            RecommendationField::CategoryId => CATEGORY_ID_KEY,
        }
    }
}

impl Display for RecommendationField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A single `field == value` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: RecommendationField,
    pub value: String,
}

/// Conjunction of equality filters over recommendation fields
///
/// An empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationQuery {
    filters: Vec<FieldFilter>,
}

impl RecommendationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query matching a single field value
    pub fn by(field: RecommendationField, value: impl Into<String>) -> Self {
        Self::new().and(field, value)
    }

    /// Adds another equality condition
    pub fn and(mut self, field: RecommendationField, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter {
            field,
            value: value.into(),
        });
        self
    }

    /// Adds a condition only when a value is given
    pub fn and_maybe(self, field: RecommendationField, value: Option<String>) -> Self {
        match value {
            Some(value) => self.and(field, value),
            None => self,
        }
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_keys() {
        assert_eq!(RecommendationField::ProductId.key(), "productId");
        assert_eq!(RecommendationField::SuggestionId.to_string(), "suggestionId");
        assert_eq!(RecommendationField::CategoryId.key(), "categoryId");
    }

    #[test]
    fn test_and_maybe_skips_missing_values() {
        let query = RecommendationQuery::new()
            .and_maybe(RecommendationField::ProductId, Some("iPhone".to_string()))
            .and_maybe(RecommendationField::CategoryId, None);

        assert_eq!(
            query.filters(),
            &[FieldFilter {
                field: RecommendationField::ProductId,
                value: "iPhone".to_string(),
            }]
        );
        assert!(RecommendationQuery::new().is_empty());
    }
}
