//! CKAN action API client.
//!
//! Implements [`CatalogClient`] over three CKAN actions:
//!
//! | Action | Used for |
//! |--------|----------|
//! | `GET package_list` | dataset names |
//! | `GET package_show?id=<name>` | resource bundle of a dataset |
//! | `GET datastore_search_sql?sql=<sql>` | running SQL against a resource |
//!
//! Every CKAN response is wrapped in `{ "success": bool, "result": ... }`;
//! a `success: false` body is reported as [`CatalogError::Api`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::models::{FieldDescriptor, Record, ResourceBundle, SqlResult};
use crate::traits::CatalogClient;

pub struct CkanClient {
    client: reqwest::Client,
    api_url: String,
}

impl CkanClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/{}", self.api_url, action)
    }

    /// Calls an action and returns its `result` member.
    ///
    /// `Ok(None)` means the catalog answered 404 (unknown id).
    async fn call(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, CatalogError> {
        let resp = self
            .client
            .get(self.action_url(action))
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| {
            CatalogError::Malformed(format!("{} returned invalid JSON: {}", action, e))
        })?;

        if json.get("success").and_then(Value::as_bool) == Some(false) {
            let message = json
                .get("error")
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(CatalogError::Api(message));
        }

        json.get("result")
            .cloned()
            .map(Some)
            .ok_or_else(|| CatalogError::Malformed(format!("{} response has no result", action)))
    }
}

#[async_trait]
impl CatalogClient for CkanClient {
    async fn fetch_dataset_names(&self) -> Result<Vec<String>, CatalogError> {
        let result = self.call("package_list", &[]).await?.unwrap_or(Value::Null);
        parse_dataset_names(&result)
    }

    async fn fetch_resource_bundle(
        &self,
        dataset: &str,
    ) -> Result<Option<ResourceBundle>, CatalogError> {
        match self.call("package_show", &[("id", dataset)]).await? {
            Some(result) => {
                let bundle: ResourceBundle = serde_json::from_value(result)
                    .map_err(|e| CatalogError::Malformed(format!("package_show: {}", e)))?;
                Ok(Some(bundle))
            }
            None => Ok(None),
        }
    }

    async fn query_sql(&self, sql: &str) -> Result<SqlResult, CatalogError> {
        let started = Instant::now();
        debug!(sql, "executing datastore SQL");
        let result = self
            .call("datastore_search_sql", &[("sql", sql)])
            .await?
            .ok_or_else(|| CatalogError::Api("datastore_search_sql: not found".to_string()))?;
        let parsed = parse_sql_result(&result)?;
        info!(
            records = parsed.records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "datastore SQL completed"
        );
        Ok(parsed)
    }
}

fn parse_dataset_names(result: &Value) -> Result<Vec<String>, CatalogError> {
    let names = result
        .as_array()
        .ok_or_else(|| CatalogError::Malformed("package_list result is not an array".into()))?;
    Ok(names
        .iter()
        .filter_map(|n| n.as_str().map(str::to_string))
        .collect())
}

fn parse_sql_result(result: &Value) -> Result<SqlResult, CatalogError> {
    let records: Vec<Record> = match result.get("records") {
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(|r| r.as_object().cloned())
            .collect(),
        _ => {
            return Err(CatalogError::Malformed(
                "datastore_search_sql result has no records".into(),
            ))
        }
    };
    let fields: Vec<FieldDescriptor> = match result.get("fields") {
        Some(fields) => serde_json::from_value(fields.clone())
            .map_err(|e| CatalogError::Malformed(format!("fields: {}", e)))?,
        None => Vec::new(),
    };
    Ok(SqlResult { fields, records })
}
