//! JSON-file backed config store.
//!
//! The whole document is read, mutated in memory and rewritten on every
//! mutation. That is only reasonable for tens to low hundreds of records.
//! Writes go to a sibling temp file that is renamed over the live one, so
//! lock-free readers always see a complete document.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::observability::metrics;
use crate::store::error::StoreError;
use crate::store::model::{ApiConfig, ApiConfigInput};

/// On-disk layout. `apis` is read as a synonym for `configs`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default, alias = "apis")]
    configs: Vec<ApiConfig>,
}

/// Durable CRUD over the list of `ApiConfig` records.
pub struct ConfigStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Open the store, creating an empty document if the file is absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };

        if !tokio::fs::try_exists(&store.path)
            .await
            .map_err(|e| store.io_err(e))?
        {
            tracing::info!(path = %store.path.display(), "Config store not found, creating an empty one");
            store.write_document(&StoreDocument::default()).await?;
        }

        let count = store.read_document().await?.configs.len();
        tracing::info!(path = %store.path.display(), configs = count, "Config store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All configs in storage order.
    pub async fn list(&self) -> Result<Vec<ApiConfig>, StoreError> {
        Ok(self.read_document().await?.configs)
    }

    pub async fn get(&self, id: &str) -> Result<ApiConfig, StoreError> {
        self.read_document()
            .await?
            .configs
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Insert a new record. Assigns an id when the input carries none.
    pub async fn create(&self, input: ApiConfigInput) -> Result<ApiConfig, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;

        let id = match input.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_id(),
        };
        if doc.configs.iter().any(|c| c.id == id) {
            return Err(StoreError::DuplicateId(id));
        }

        let config = ApiConfig::from_input(id, input, Utc::now());
        config.validate().map_err(StoreError::InvalidConfig)?;

        doc.configs.push(config.clone());
        self.write_document(&doc).await?;

        metrics::record_store_mutation("create");
        tracing::info!(config_id = %config.id, "Config created");
        Ok(config)
    }

    /// Shallow-merge `patch` over the stored record.
    pub async fn update(&self, id: &str, patch: ApiConfigInput) -> Result<ApiConfig, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;

        let slot = doc
            .configs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = slot.clone();
        updated.apply(patch, Utc::now());
        updated.validate().map_err(StoreError::InvalidConfig)?;
        *slot = updated.clone();

        self.write_document(&doc).await?;

        metrics::record_store_mutation("update");
        tracing::info!(config_id = %id, "Config updated");
        Ok(updated)
    }

    /// Remove the record. Signals `NotFound` when nothing matched.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;

        let before = doc.configs.len();
        doc.configs.retain(|c| c.id != id);
        if doc.configs.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.write_document(&doc).await?;

        metrics::record_store_mutation("delete");
        tracing::info!(config_id = %id, "Config deleted");
        Ok(())
    }

    async fn read_document(&self) -> Result<StoreDocument, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreDocument::default())
            }
            Err(e) => return Err(self.io_err(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreDocument::default());
        }
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_document(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_err(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "db.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn generate_id() -> String {
    format!("api-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn input(value: serde_json::Value) -> ApiConfigInput {
        serde_json::from_value(value).unwrap()
    }

    async fn open_temp() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(dir.path().join("db.json")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_open_initializes_empty_document() {
        let (dir, store) = open_temp().await;
        assert!(store.list().await.unwrap().is_empty());

        let raw = std::fs::read_to_string(dir.path().join("db.json")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc, json!({"configs": []}));
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_dir, store) = open_temp().await;
        let created = store
            .create(input(json!({
                "name": "Translate",
                "externalUrl": "https://example.com/fanyi",
                "requiredFields": ["text"]
            })))
            .await
            .unwrap();

        assert!(created.id.starts_with("api-"));
        assert!(created.created_at.is_some());

        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_duplicate_id_leaves_store_untouched() {
        let (_dir, store) = open_temp().await;
        store
            .create(input(json!({"id": "dup", "name": "first", "externalUrl": "https://a.io"})))
            .await
            .unwrap();

        let err = store
            .create(input(json!({"id": "dup", "name": "second", "externalUrl": "https://b.io"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(ref id) if id == "dup"));

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "first");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (_dir, store) = open_temp().await;
        let err = store.create(input(json!({"name": "no url"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_identity() {
        let (_dir, store) = open_temp().await;
        let created = store
            .create(input(json!({
                "id": "weather",
                "name": "Weather",
                "externalUrl": "https://a.io",
                "requiredFields": ["city"]
            })))
            .await
            .unwrap();

        let updated = store
            .update("weather", input(json!({"id": "hijack", "enabled": false})))
            .await
            .unwrap();

        assert_eq!(updated.id, "weather");
        assert_eq!(updated.name, "Weather");
        assert_eq!(updated.required_fields, vec!["city"]);
        assert!(!updated.enabled);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(store.get("weather").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_dir, store) = open_temp().await;
        let err = store.update("ghost", ApiConfigInput::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (_dir, store) = open_temp().await;
        store
            .create(input(json!({"id": "a", "externalUrl": "https://a.io"})))
            .await
            .unwrap();
        store
            .create(input(json!({"id": "b", "externalUrl": "https://b.io"})))
            .await
            .unwrap();

        store.delete("a").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);

        let err = store.delete("a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_apis_key_is_read_and_rewritten_as_configs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            r#"{"apis": [{"id": "fanyi-api", "externalUrl": "https://uapis.cn/api/fanyi"}]}"#,
        )
        .unwrap();

        let store = ConfigStore::open(&path).await.unwrap();
        assert_eq!(store.list().await.unwrap()[0].id, "fanyi-api");

        store
            .create(input(json!({"id": "second", "externalUrl": "https://b.io"})))
            .await
            .unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc.get("apis").is_none());
        assert_eq!(doc["configs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_legacy_joined_required_fields_check_the_response() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            r#"{"configs": [{"id": "legacy", "externalApiUrl": "https://x.io/w", "isEnabled": true, "requiredFields": "temp"}]}"#,
        )
        .unwrap();

        let store = ConfigStore::open(&path).await.unwrap();
        let cfg = store.get("legacy").await.unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.external_url, "https://x.io/w");
        assert!(cfg.required_fields.is_empty());
        assert_eq!(cfg.response_required_fields, vec!["temp"]);

        // The next write persists the canonical list form.
        store.update("legacy", input(json!({"name": "Weather"}))).await.unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["configs"][0]["requiredFields"], json!([]));
        assert_eq!(doc["configs"][0]["responseRequiredFields"], json!(["temp"]));
    }

    #[tokio::test]
    async fn test_missing_file_after_open_reads_empty() {
        let (dir, store) = open_temp().await;
        std::fs::remove_file(dir.path().join("db.json")).unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let err = ConfigStore::open(&path).await.err().unwrap();
        assert!(err.is_storage_failure());
        assert_eq!(err.kind(), "storage_io_error");
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_not_lost() {
        let (_dir, store) = open_temp().await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create(input(json!({
                        "id": format!("cfg-{}", i),
                        "externalUrl": "https://a.io"
                    })))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 16);
    }
}
