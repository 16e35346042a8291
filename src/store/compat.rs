//! Deserializers tolerant of older record shapes.
//!
//! Earlier admin UIs stored field lists as comma-separated strings and
//! custom fields as a JSON-encoded `{name: value}` object. Both are accepted
//! on read and normalised; records are always written back canonically.
//! A joined `requiredFields` string named fields of the upstream answer, so
//! it is read into the response-side list.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::store::model::CustomField;

/// A field list as written: a JSON array or a comma-joined string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    List(Vec<String>),
    Joined(String),
}

impl FieldList {
    fn into_fields(self) -> Vec<String> {
        match self {
            FieldList::List(items) => normalize(items),
            FieldList::Joined(s) => split_joined(&s),
        }
    }
}

/// Trim names and drop empty ones.
pub fn normalize(fields: Vec<String>) -> Vec<String> {
    fields
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

pub fn split_joined(joined: &str) -> Vec<String> {
    normalize(joined.split(',').map(str::to_string).collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CustomFieldsRepr {
    List(Vec<CustomField>),
    Object(Map<String, Value>),
    Encoded(String),
}

impl CustomFieldsRepr {
    fn normalize(self) -> Result<Vec<CustomField>, String> {
        match self {
            CustomFieldsRepr::List(fields) => Ok(fields),
            CustomFieldsRepr::Object(map) => Ok(fixed_from_object(map)),
            CustomFieldsRepr::Encoded(s) if s.trim().is_empty() => Ok(Vec::new()),
            CustomFieldsRepr::Encoded(s) => serde_json::from_str::<Map<String, Value>>(&s)
                .map(fixed_from_object)
                .map_err(|e| format!("customFields string is not a JSON object: {}", e)),
        }
    }
}

fn fixed_from_object(map: Map<String, Value>) -> Vec<CustomField> {
    map.into_iter()
        .map(|(name, value)| CustomField::fixed(name, value))
        .collect()
}

pub fn opt_field_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    let repr = Option::<FieldList>::deserialize(deserializer)?;
    Ok(repr.map(FieldList::into_fields))
}

pub fn opt_custom_fields<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<CustomField>>, D::Error> {
    match Option::<CustomFieldsRepr>::deserialize(deserializer)? {
        Some(repr) => repr.normalize().map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}
