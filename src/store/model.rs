//! Registered proxy targets.
//!
//! `ApiConfig` is the canonical stored record. `ApiConfigInput` is the
//! partial shape accepted by create and update; every member is optional so
//! the same type serves both a full create body and a shallow patch.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::store::compat;

/// Outbound HTTP method for a proxy target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported method '{}'", other)),
        }
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// How a custom field obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldKind {
    /// Computed at request time from a named generator.
    Auto,
    /// Copied verbatim from `value`.
    Fixed,
}

/// A value injected into proxy responses that did not come from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: CustomFieldKind,

    /// Generator name for `auto` (`current_time`, `uuid`), literal for `fixed`.
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl CustomField {
    pub fn fixed(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: CustomFieldKind::Fixed,
            value: value.into(),
            description: String::new(),
        }
    }

    pub fn auto(name: impl Into<String>, generator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CustomFieldKind::Auto,
            value: Value::String(generator.into()),
            description: String::new(),
        }
    }
}

/// A registered external-API proxy target.
///
/// Stored records are read through the same shape as admin input, so they
/// get the same defaults and legacy handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawConfigInput")]
pub struct ApiConfig {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Plain URL or a template containing `{{query.<name>}}` placeholders.
    pub external_url: String,

    pub method: HttpMethod,
    pub enabled: bool,

    /// Checked against the merged inbound parameters, in declaration order.
    pub required_fields: Vec<String>,

    pub optional_fields: Vec<String>,

    /// Inbound parameter name -> upstream parameter name.
    pub field_mapping: BTreeMap<String, String>,

    /// Caller-facing name -> upstream response field name.
    pub response_mapping: BTreeMap<String, String>,

    /// Allow-list applied to the upstream response; empty keeps everything.
    pub visible_fields: Vec<String>,

    /// Fields the upstream response itself must contain.
    pub response_required_fields: Vec<String>,

    pub custom_fields: Vec<CustomField>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawConfigInput> for ApiConfig {
    type Error = String;

    fn try_from(mut raw: RawConfigInput) -> Result<Self, Self::Error> {
        let id = raw.id.take().ok_or_else(|| "missing field `id`".to_string())?;
        let created_at = raw.created_at.take();
        let updated_at = raw.updated_at.take();

        let mut config = ApiConfig::from_input(id, raw.into(), Utc::now());
        config.created_at = created_at;
        config.updated_at = updated_at;
        Ok(config)
    }
}

/// Partial config accepted by create (all members) and update (shallow patch).
///
/// `id` is honoured on create only; `createdAt`/`updatedAt` are never taken
/// from callers. A `requiredFields` given as a comma-joined string is the
/// older record shape, where it named fields of the upstream response; it is
/// read into `response_required_fields`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawConfigInput")]
pub struct ApiConfigInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub external_url: Option<String>,
    pub method: Option<HttpMethod>,
    pub enabled: Option<bool>,
    pub required_fields: Option<Vec<String>>,
    pub optional_fields: Option<Vec<String>>,
    pub field_mapping: Option<BTreeMap<String, String>>,
    pub response_mapping: Option<BTreeMap<String, String>>,
    pub visible_fields: Option<Vec<String>>,
    pub response_required_fields: Option<Vec<String>>,
    pub custom_fields: Option<Vec<CustomField>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfigInput {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default, alias = "externalApiUrl")]
    external_url: Option<String>,

    #[serde(default)]
    method: Option<HttpMethod>,

    #[serde(default, alias = "isEnabled")]
    enabled: Option<bool>,

    #[serde(default)]
    required_fields: Option<compat::FieldList>,

    #[serde(default, deserialize_with = "compat::opt_field_list")]
    optional_fields: Option<Vec<String>>,

    #[serde(default)]
    field_mapping: Option<BTreeMap<String, String>>,

    #[serde(default)]
    response_mapping: Option<BTreeMap<String, String>>,

    #[serde(default, deserialize_with = "compat::opt_field_list")]
    visible_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "compat::opt_field_list")]
    response_required_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "compat::opt_custom_fields")]
    custom_fields: Option<Vec<CustomField>>,

    /// Honoured only when reading stored records.
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RawConfigInput> for ApiConfigInput {
    fn from(raw: RawConfigInput) -> Self {
        let mut required_fields = None;
        let mut response_required_fields = raw.response_required_fields;

        match raw.required_fields {
            Some(compat::FieldList::List(fields)) => {
                required_fields = Some(compat::normalize(fields));
            }
            Some(compat::FieldList::Joined(joined)) => {
                let response = response_required_fields.get_or_insert_with(Vec::new);
                for field in compat::split_joined(&joined) {
                    if !response.contains(&field) {
                        response.push(field);
                    }
                }
            }
            None => {}
        }

        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            external_url: raw.external_url,
            method: raw.method,
            enabled: raw.enabled,
            required_fields,
            optional_fields: raw.optional_fields,
            field_mapping: raw.field_mapping,
            response_mapping: raw.response_mapping,
            visible_fields: raw.visible_fields,
            response_required_fields,
            custom_fields: raw.custom_fields,
        }
    }
}

impl ApiConfig {
    /// Build a new record from caller input, applying defaults.
    pub fn from_input(id: String, input: ApiConfigInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.unwrap_or_default(),
            description: input.description.unwrap_or_default(),
            external_url: input.external_url.unwrap_or_default(),
            method: input.method.unwrap_or_default(),
            enabled: input.enabled != Some(false),
            required_fields: input.required_fields.unwrap_or_default(),
            optional_fields: input.optional_fields.unwrap_or_default(),
            field_mapping: input.field_mapping.unwrap_or_default(),
            response_mapping: input.response_mapping.unwrap_or_default(),
            visible_fields: input.visible_fields.unwrap_or_default(),
            response_required_fields: input.response_required_fields.unwrap_or_default(),
            custom_fields: input.custom_fields.unwrap_or_default(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Shallow-merge a patch. `id` and `created_at` are never touched.
    pub fn apply(&mut self, patch: ApiConfigInput, now: DateTime<Utc>) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.external_url {
            self.external_url = v;
        }
        if let Some(v) = patch.method {
            self.method = v;
        }
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.required_fields {
            self.required_fields = v;
        }
        if let Some(v) = patch.optional_fields {
            self.optional_fields = v;
        }
        if let Some(v) = patch.field_mapping {
            self.field_mapping = v;
        }
        if let Some(v) = patch.response_mapping {
            self.response_mapping = v;
        }
        if let Some(v) = patch.visible_fields {
            self.visible_fields = v;
        }
        if let Some(v) = patch.response_required_fields {
            self.response_required_fields = v;
        }
        if let Some(v) = patch.custom_fields {
            self.custom_fields = v;
        }
        self.updated_at = Some(now);
    }

    /// Semantic checks run before a record is accepted into the store.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".into());
        }
        if self.id.contains('/') {
            return Err(format!("id '{}' must not contain '/'", self.id));
        }
        if self.external_url.trim().is_empty() {
            return Err("externalUrl is required".into());
        }
        let candidate = crate::gateway::outbound::PLACEHOLDER.replace_all(&self.external_url, "x");
        match url::Url::parse(&candidate) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            Ok(u) => {
                return Err(format!(
                    "externalUrl scheme '{}' is not supported",
                    u.scheme()
                ))
            }
            Err(e) => return Err(format!("externalUrl is not a valid URL: {}", e)),
        }
        for field in &self.custom_fields {
            if field.name.trim().is_empty() {
                return Err("custom field name must not be empty".into());
            }
        }
        Ok(())
    }
}
