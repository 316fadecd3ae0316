use mongodb::bson::oid::ObjectId;
use serde_json::Value;

use super::error::ApiError;

/// Parse a path or query identifier, rejecting anything that is not a
/// well-formed ObjectId before the store is touched.
pub fn parse_object_id(resource: &'static str, value: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value).map_err(|_| ApiError::InvalidIdentifier(resource))
}

/// Keep an optional string field only when it is present and non-empty.
#[must_use]
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Coerce a supplied `tags` value to an ordered list of strings.
/// Anything that is not an array is discarded rather than rejected;
/// non-string array members are dropped.
#[must_use]
pub fn coerce_tags(value: &Value) -> Vec<String> {
    value.as_array().map_or_else(Vec::new, |items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    })
}
