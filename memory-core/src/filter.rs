//! Unified filter expressions for search, and a compiler into the vector
//! store's `must`/`range` dialect.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    In,
}

/// Unified filter expression for queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub value: serde_json::Value,
}

impl FilterExpr {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn contains(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }
}

/// The structured filters accepted by `/search` and `/timeline/{..}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchFilters {
    pub entity_type: Option<String>,
    pub channel: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub since: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub until: Option<Timestamp>,
}

/// One `must` matcher in the vector store's filter dialect.
#[derive(Debug, Clone, Serialize)]
pub struct VectorMatch {
    pub key: String,
    #[serde(rename = "match")]
    pub matcher: VectorMatcher,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorMatcher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any: Option<Vec<serde_json::Value>>,
}

/// A `gte`/`lte` range matcher applied to a numeric/timestamp field.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRange {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

/// The compiled filter body sent as part of a vector search/upsert-matching
/// request: `{must: [...], range: [...]}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VectorFilter {
    pub must: Vec<VectorMatch>,
    pub range: Vec<VectorRange>,
}

impl VectorFilter {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.range.is_empty()
    }
}

/// Compile `SearchFilters` into the vector store's filter dialect.
pub fn compile_filter(filters: &SearchFilters) -> VectorFilter {
    let mut out = VectorFilter::default();

    if let Some(entity_type) = &filters.entity_type {
        out.must.push(VectorMatch {
            key: "entity_types".to_string(),
            matcher: VectorMatcher {
                value: None,
                any: Some(vec![serde_json::Value::String(entity_type.clone())]),
            },
        });
    }

    if let Some(channel) = &filters.channel {
        out.must.push(VectorMatch {
            key: "channel".to_string(),
            matcher: VectorMatcher {
                value: Some(serde_json::Value::String(channel.clone())),
                any: None,
            },
        });
    }

    if filters.since.is_some() || filters.until.is_some() {
        out.range.push(VectorRange {
            key: "timestamp".to_string(),
            gte: filters.since.map(|t| t.timestamp() as f64),
            lte: filters.until.map(|t| t.timestamp() as f64),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_compile_to_empty_filter() {
        let compiled = compile_filter(&SearchFilters::default());
        assert!(compiled.is_empty());
    }

    #[test]
    fn entity_type_compiles_to_any_matcher() {
        let filters = SearchFilters {
            entity_type: Some("Organization".to_string()),
            ..Default::default()
        };
        let compiled = compile_filter(&filters);
        assert_eq!(compiled.must.len(), 1);
        assert_eq!(compiled.must[0].key, "entity_types");
        assert!(compiled.must[0].matcher.any.is_some());
    }

    #[test]
    fn since_and_until_compile_to_one_range() {
        use chrono::TimeZone;
        let filters = SearchFilters {
            since: Some(chrono::Utc.timestamp_opt(1000, 0).unwrap()),
            until: Some(chrono::Utc.timestamp_opt(2000, 0).unwrap()),
            ..Default::default()
        };
        let compiled = compile_filter(&filters);
        assert_eq!(compiled.range.len(), 1);
        assert_eq!(compiled.range[0].gte, Some(1000.0));
        assert_eq!(compiled.range[0].lte, Some(2000.0));
    }
}
