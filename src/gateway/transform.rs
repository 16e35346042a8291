//! Upstream response post-processing.
//!
//! Order: response-side required check → rename → allow-list → custom
//! fields → `_meta`.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::gateway::error::ProxyError;
use crate::store::{ApiConfig, CustomField, CustomFieldKind};

/// Responses that are not JSON objects are wrapped under this key.
pub const WRAP_KEY: &str = "data";

/// Source tag written into `_meta`.
pub const META_SOURCE: &str = "api-relay";

pub fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert(WRAP_KEY.to_string(), other);
            map
        }
    }
}

pub fn check_response_fields(
    required: &[String],
    body: &Map<String, Value>,
) -> Result<(), ProxyError> {
    match required.iter().find(|f| !body.contains_key(f.as_str())) {
        Some(field) => Err(ProxyError::UpstreamMissingField(field.clone())),
        None => Ok(()),
    }
}

/// Move `body[upstream]` to `caller` for every mapping entry whose source exists.
pub fn apply_response_mapping(
    mut body: Map<String, Value>,
    mapping: &BTreeMap<String, String>,
) -> Map<String, Value> {
    if mapping.is_empty() {
        return body;
    }
    let renamed: Map<String, Value> = mapping
        .iter()
        .filter_map(|(caller, upstream)| {
            body.get(upstream).map(|v| (caller.clone(), v.clone()))
        })
        .collect();
    for upstream in mapping.values() {
        body.remove(upstream);
    }
    body.extend(renamed);
    body
}

/// Keep only listed fields. An empty list keeps everything.
pub fn filter_visible(body: Map<String, Value>, visible: &[String]) -> Map<String, Value> {
    if visible.is_empty() {
        return body;
    }
    body.into_iter()
        .filter(|(k, _)| visible.iter().any(|v| v == k))
        .collect()
}

/// Value of a custom field at `now`. Unknown `auto` generators yield `None`.
pub fn custom_field_value(field: &CustomField, now: DateTime<Utc>) -> Option<Value> {
    match field.kind {
        CustomFieldKind::Fixed => Some(field.value.clone()),
        CustomFieldKind::Auto => match field.value.as_str() {
            Some("current_time") => Some(Value::String(iso_timestamp(now))),
            Some("uuid") => Some(Value::String(Uuid::new_v4().to_string())),
            other => {
                tracing::debug!(field = %field.name, generator = ?other, "Unknown auto generator, skipping field");
                None
            }
        },
    }
}

/// Merge custom fields; they override same-named upstream fields.
pub fn apply_custom_fields(body: &mut Map<String, Value>, fields: &[CustomField], now: DateTime<Utc>) {
    for field in fields {
        if let Some(value) = custom_field_value(field, now) {
            body.insert(field.name.clone(), value);
        }
    }
}

pub fn attach_meta(body: &mut Map<String, Value>, config: &ApiConfig, now: DateTime<Utc>) {
    body.insert(
        "_meta".to_string(),
        json!({
            "configId": config.id,
            "configName": config.name,
            "timestamp": iso_timestamp(now),
            "source": META_SOURCE,
        }),
    );
}

pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_non_objects_are_wrapped() {
        assert_eq!(into_object(json!([1, 2])), obj(json!({"data": [1, 2]})));
        assert_eq!(into_object(json!("x")), obj(json!({"data": "x"})));
        assert_eq!(into_object(json!({"a": 1})), obj(json!({"a": 1})));
    }

    #[test]
    fn test_visible_fields_filter() {
        let out = filter_visible(obj(json!({"a": 1, "b": 2, "c": 3})), &["b".into(), "a".into()]);
        assert_eq!(out, obj(json!({"a": 1, "b": 2})));

        let all = filter_visible(obj(json!({"a": 1})), &[]);
        assert_eq!(all, obj(json!({"a": 1})));
    }

    #[test]
    fn test_response_required_fields() {
        let body = obj(json!({"code": 200}));
        assert!(check_response_fields(&["code".into()], &body).is_ok());
        match check_response_fields(&["code".into(), "data".into()], &body) {
            Err(ProxyError::UpstreamMissingField(f)) => assert_eq!(f, "data"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_response_mapping_renames() {
        let mut mapping = BTreeMap::new();
        mapping.insert("success".to_string(), "code".to_string());
        mapping.insert("message".to_string(), "msg".to_string());
        mapping.insert("data".to_string(), "data".to_string());

        let out = apply_response_mapping(obj(json!({"code": 200, "data": "hi", "extra": true})), &mapping);
        assert_eq!(out, obj(json!({"success": 200, "data": "hi", "extra": true})));
    }

    #[test]
    fn test_custom_fields_override_upstream() {
        let now = Utc::now();
        let mut body = obj(json!({"source": "upstream", "a": 1}));
        apply_custom_fields(
            &mut body,
            &[
                CustomField::fixed("source", "custom_api"),
                CustomField::auto("ts", "current_time"),
                CustomField::auto("token", "uuid"),
                CustomField::auto("ignored", "nope"),
            ],
            now,
        );
        assert_eq!(body["source"], json!("custom_api"));
        assert_eq!(body["ts"], json!(iso_timestamp(now)));
        assert!(Uuid::parse_str(body["token"].as_str().unwrap()).is_ok());
        assert!(!body.contains_key("ignored"));
    }

    #[test]
    fn test_iso_timestamp_format() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T08:09:10.123Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso_timestamp(t), "2024-05-01T08:09:10.123Z");
    }
}
