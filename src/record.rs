//! Raw server entities and the normalised records handed to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::codec::decode_props;

/// A node or relationship as returned by the execution service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Engine-assigned identity.
    #[serde(alias = "_id")]
    pub identity: i64,
    /// Attribute bag, possibly holding JSON-encoded objects.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Node labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Start node identity, for relationships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// End node identity, for relationships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Relationship type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<String>,
}

impl RawEntity {
    /// Node with the given identity and attributes.
    pub fn node<I, S>(identity: i64, labels: I, properties: Map<String, Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity,
            properties,
            labels: labels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Relationship of `rel_type` from `start` to `end`.
    pub fn relationship(
        identity: i64,
        rel_type: impl Into<String>,
        start: i64,
        end: i64,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            identity,
            properties,
            start: Some(start),
            end: Some(end),
            rel_type: Some(rel_type.into()),
            ..Self::default()
        }
    }
}

/// One result row: result alias to entity.
pub type RawRow = BTreeMap<String, RawEntity>;

/// Caller-facing entity.
///
/// Serialises as `{_id, id?, data, labels?, start?, end?, type?}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Engine-assigned identity.
    #[serde(rename = "_id")]
    pub identity: i64,
    /// User `id` attribute, promoted when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Decoded attributes.
    pub data: Map<String, Value>,
    /// Node labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Start node identity, for relationships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// End node identity, for relationships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Relationship type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<String>,
}

impl NormalizedRecord {
    /// One decoded attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// True for relationship records.
    pub fn is_relationship(&self) -> bool {
        self.rel_type.is_some()
    }
}

/// Caller-facing row: result alias to record.
pub type RecordRow = BTreeMap<String, NormalizedRecord>;

/// Promotes a user `id`, renames the attribute bag and decodes JSON-string
/// attributes.
pub fn reshape(raw: RawEntity) -> NormalizedRecord {
    let id = raw.properties.get("id").filter(|v| !v.is_null()).cloned();
    NormalizedRecord {
        identity: raw.identity,
        id,
        data: decode_props(&raw.properties),
        labels: raw.labels,
        start: raw.start,
        end: raw.end,
        rel_type: raw.rel_type,
    }
}

/// Reshapes every entity of a row.
pub fn reshape_row(row: RawRow) -> RecordRow {
    row.into_iter()
        .map(|(alias, entity)| (alias, reshape(entity)))
        .collect()
}
