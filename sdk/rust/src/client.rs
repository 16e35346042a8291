use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Envelope every relay endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay returned {status}: {message} ({kind})")]
    Api {
        status: StatusCode,
        kind: String,
        message: String,
    },

    #[error("relay returned an unexpected body ({status}): {body}")]
    Decode { status: StatusCode, body: String },
}

impl ClientError {
    /// Machine error kind reported by the relay, if any.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } | ClientError::Decode { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxy settings).
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_configs(&self) -> Result<Vec<Value>, ClientError> {
        let resp = self.client.get(self.url("/configs")).send().await?;
        decode(resp).await
    }

    pub async fn get_config(&self, id: &str) -> Result<Value, ClientError> {
        let resp = self.client.get(self.url(&format!("/configs/{}", id))).send().await?;
        decode(resp).await
    }

    /// Register a config. `config` is any partial config object.
    pub async fn create_config(&self, config: &Value) -> Result<Value, ClientError> {
        let resp = self.client.post(self.url("/configs")).json(config).send().await?;
        decode(resp).await
    }

    pub async fn update_config(&self, id: &str, patch: &Value) -> Result<Value, ClientError> {
        let resp = self
            .client
            .put(self.url(&format!("/configs/{}", id)))
            .json(patch)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_config(&self, id: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .delete(self.url(&format!("/configs/{}", id)))
            .send()
            .await?;
        decode::<Value>(resp).await.map(|_| ()).or_else(|e| match e {
            // Deletion answers with a message and no data.
            ClientError::Decode { status, .. } if status.is_success() => Ok(()),
            other => Err(other),
        })
    }

    /// Check connectivity to the upstream of a config.
    pub async fn test_config(&self, id: &str, params: Map<String, Value>) -> Result<Envelope<Value>, ClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/test/{}", id)))
            .json(&json!({ "testParams": params }))
            .send()
            .await?;
        envelope(resp).await
    }

    /// Call a config through the proxy with a JSON body.
    pub async fn call(&self, id: &str, params: &Map<String, Value>) -> Result<Value, ClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/proxy/{}", id)))
            .json(params)
            .send()
            .await?;
        decode(resp).await
    }

    /// Call a config through the proxy with query parameters.
    pub async fn call_get(&self, id: &str, query: &[(&str, &str)]) -> Result<Value, ClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/proxy/{}", id)))
            .query(query)
            .send()
            .await?;
        decode(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn envelope<T: DeserializeOwned>(resp: Response) -> Result<Envelope<T>, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|_| ClientError::Decode { status, body: text })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;
    let env: Envelope<T> = serde_json::from_str(&text).map_err(|_| ClientError::Decode {
        status,
        body: text.clone(),
    })?;

    if !env.success || !status.is_success() {
        let kind = env
            .error
            .as_ref()
            .and_then(|e| e.get("kind"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(ClientError::Api {
            status,
            kind,
            message: env.message.unwrap_or_default(),
        });
    }

    env.data.ok_or(ClientError::Decode { status, body: text })
}
