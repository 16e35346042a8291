//! Outbound request construction.
//!
//! A URL either carries `{{query.<name>}}` placeholders, in which case it is
//! fully resolved by substitution, or it is a plain URL that receives the
//! remapped parameters as a query string (GET only). The two never combine.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use url::Url;

use crate::gateway::error::ProxyError;
use crate::gateway::params::{to_param_string, Params};
use crate::store::HttpMethod;

/// Matches `{{query.<name>}}` template tokens.
pub static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*query\.(\w+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Characters left unescaped in substituted values: alphanumerics plus
/// `- _ . ! ~ * ' ( )`, so the result is safe in a path segment or a query.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A fully resolved upstream call.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Sent as JSON for every method except GET.
    pub body: Option<Params>,
}

/// Build the upstream call.
///
/// `merged` feeds placeholder substitution, `outbound` is the remapped set
/// sent as query string or body.
pub fn build(
    template: &str,
    method: HttpMethod,
    merged: &Params,
    outbound: Params,
) -> Result<OutboundRequest, ProxyError> {
    let templated = PLACEHOLDER.is_match(template);

    let raw = if templated {
        substitute(template, merged)
    } else {
        template.to_string()
    };
    let mut url = Url::parse(&raw).map_err(|e| ProxyError::InvalidUpstreamUrl(e.to_string()))?;

    let body = if method == HttpMethod::Get {
        if !templated && !outbound.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &outbound {
                pairs.append_pair(k, &to_param_string(v));
            }
        }
        None
    } else {
        Some(outbound)
    };

    Ok(OutboundRequest { method, url, body })
}

/// Replace placeholders with percent-encoded values; absent names become "".
///
/// A space becomes `%20`, never `+`, since placeholders may sit in the path.
pub fn substitute(template: &str, params: &Params) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            params
                .get(&caps[1])
                .map(to_param_string)
                .map(|v| utf8_percent_encode(&v, COMPONENT).to_string())
                .unwrap_or_default()
        })
        .into_owned()
}
