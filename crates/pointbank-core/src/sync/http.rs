//! REST client for a PostgREST-style record service.
//!
//! Tables: `point_records`, `time_records`, `student_profiles`. Each row
//! carries the owner identity in `student_id`; profiles are keyed by `id`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::RemoteError;
use crate::storage::RemoteConfig;
use crate::sync::remote::{with_field, RemoteAdapter, RemoteCollection, OWNER_FIELD};

const PROFILES_TABLE: &str = "student_profiles";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// HTTP remote adapter.
pub struct HttpRemote {
    base: Url,
    api_key: String,
    client: Client,
}

impl HttpRemote {
    /// Client for `base_url` (the service root, without `/rest/v1`).
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_client(base_url, api_key, Client::new())
    }

    pub fn with_client(
        base_url: &str,
        api_key: impl Into<String>,
        client: Client,
    ) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base_url.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base: base.join("rest/v1/")?,
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from configuration. Fails with `NotConfigured` when the remote
    /// is disabled or has no URL.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        if !config.is_usable() {
            return Err(RemoteError::NotConfigured);
        }
        let client = Client::builder().timeout(config.timeout()).build()?;
        Self::with_client(&config.base_url, config.api_key.clone(), client)
    }

    fn table_url(&self, table: &str, query: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = self.base.join(table)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "remote request");
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn read_json(response: Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn first_row(rows: Value, operation: &str) -> Result<Value, RemoteError> {
        match rows {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
            Value::Object(_) => Ok(rows),
            _ => Err(RemoteError::Rejected(format!(
                "{operation} returned no representation"
            ))),
        }
    }

    fn rows(value: Value) -> Result<Vec<Value>, RemoteError> {
        match value {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(RemoteError::Rejected(format!(
                "expected a JSON array, got {other}"
            ))),
        }
    }

    async fn upsert(&self, table: &str, payload: Value) -> Result<Value, RemoteError> {
        let url = self.table_url(table, &[])?;
        let response = self
            .request(Method::POST, url)
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&json!([payload]))
            .send()
            .await?;
        Self::first_row(Self::read_json(response).await?, table)
    }
}

#[async_trait]
impl RemoteAdapter for HttpRemote {
    async fn create(
        &self,
        collection: RemoteCollection,
        payload: Value,
        owner_id: &str,
    ) -> Result<Value, RemoteError> {
        self.upsert(collection.table(), with_field(payload, OWNER_FIELD, owner_id))
            .await
    }

    async fn list(
        &self,
        collection: RemoteCollection,
        owner_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.table_url(
            collection.table(),
            &[
                (OWNER_FIELD, format!("eq.{owner_id}")),
                ("order", "timestamp.desc".to_string()),
            ],
        )?;
        let response = self.request(Method::GET, url).send().await?;
        Self::rows(Self::read_json(response).await?)
    }

    async fn update(
        &self,
        collection: RemoteCollection,
        id: &str,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        let url = self.table_url(collection.table(), &[("id", format!("eq.{id}"))])?;
        let response = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::first_row(Self::read_json(response).await?, "update")
    }

    async fn delete(&self, collection: RemoteCollection, id: &str) -> Result<(), RemoteError> {
        let url = self.table_url(collection.table(), &[("id", format!("eq.{id}"))])?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::read_json(response).await?;
        Ok(())
    }

    async fn get_profile(&self, owner_id: &str) -> Result<Option<Value>, RemoteError> {
        let url = self.table_url(PROFILES_TABLE, &[("id", format!("eq.{owner_id}"))])?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(Self::rows(Self::read_json(response).await?)?.into_iter().next())
    }

    async fn upsert_profile(&self, payload: Value) -> Result<Value, RemoteError> {
        self.upsert(PROFILES_TABLE, payload).await
    }

    async fn probe_health(&self) -> bool {
        let url = match self.table_url(
            RemoteCollection::PointRecords.table(),
            &[("select", "id".to_string()), ("limit", "1".to_string())],
        ) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.request(Method::GET, url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "health probe failed");
                false
            }
        }
    }
}
