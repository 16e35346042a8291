//! Inbound parameter handling: merge, validate, remap.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::gateway::error::ProxyError;

/// A flat parameter set keyed by field name.
pub type Params = Map<String, Value>;

/// Parameters of one inbound proxy call.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub query: Params,
    pub body: Params,
    /// Correlation id forwarded to the upstream as `x-request-id`.
    pub request_id: Option<String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `a=1&b=2` query string. Repeated keys keep the last value.
    pub fn from_query_string(raw: Option<&str>) -> Self {
        let query = raw
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Params) -> Self {
        self.body = body;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Query and body combined. Body wins on key collision.
    pub fn merged(&self) -> Params {
        let mut merged = self.query.clone();
        for (k, v) in &self.body {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

/// Absent, null and empty-string values count as missing.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Fail on the first missing field, scanning in declaration order.
pub fn check_required(required: &[String], params: &Params) -> Result<(), ProxyError> {
    match required.iter().find(|f| !is_present(params.get(f.as_str()))) {
        Some(field) => Err(ProxyError::MissingRequiredField(field.clone())),
        None => Ok(()),
    }
}

/// Rename keys through `mapping`; unmapped keys keep their name.
pub fn remap(params: &Params, mapping: &BTreeMap<String, String>) -> Params {
    params
        .iter()
        .map(|(k, v)| {
            let key = mapping
                .get(k)
                .filter(|m| !m.is_empty())
                .unwrap_or(k)
                .clone();
            (key, v.clone())
        })
        .collect()
}

/// Render a parameter value for a query string or URL template.
pub fn to_param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_body_overrides_query() {
        let params = RequestParams::from_query_string(Some("text=query&lang=en"))
            .with_body(obj(json!({"text": "body"})));
        let merged = params.merged();
        assert_eq!(merged["text"], json!("body"));
        assert_eq!(merged["lang"], json!("en"));
    }

    #[test]
    fn test_query_string_decoding() {
        let params = RequestParams::from_query_string(Some("q=hello%20world&q=last&x=a+b"));
        assert_eq!(params.query["q"], json!("last"));
        assert_eq!(params.query["x"], json!("a b"));
        assert!(RequestParams::from_query_string(None).query.is_empty());
    }

    #[test]
    fn test_first_missing_field_in_declaration_order() {
        let required = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        let params = obj(json!({"c": "present"}));
        match check_required(&required, &params) {
            Err(ProxyError::MissingRequiredField(f)) => assert_eq!(f, "b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_values_are_missing() {
        let required = vec!["text".to_string()];
        assert!(check_required(&required, &obj(json!({"text": ""}))).is_err());
        assert!(check_required(&required, &obj(json!({"text": null}))).is_err());
        assert!(check_required(&required, &obj(json!({"text": 0}))).is_ok());
        assert!(check_required(&required, &obj(json!({"text": "hi"}))).is_ok());
    }

    #[test]
    fn test_remap_passes_unmapped_keys_through() {
        let mut mapping = BTreeMap::new();
        mapping.insert("text".to_string(), "q".to_string());
        let out = remap(&obj(json!({"text": "hi", "lang": "en"})), &mapping);
        assert_eq!(out, obj(json!({"q": "hi", "lang": "en"})));
    }

    #[test]
    fn test_param_strings() {
        assert_eq!(to_param_string(&json!("a")), "a");
        assert_eq!(to_param_string(&json!(3)), "3");
        assert_eq!(to_param_string(&json!(true)), "true");
        assert_eq!(to_param_string(&Value::Null), "");
    }
}
