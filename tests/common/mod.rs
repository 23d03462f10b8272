//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use recife_data::error::{CatalogError, LlmError};
use recife_data::models::{FieldDescriptor, Record, ResourceBundle, ResourceDescriptor, SqlResult};
use recife_data::traits::{CatalogClient, CompletionRequest, LanguageModel};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

// ─── Fake catalog ───────────────────────────────────────────────────

/// A catalog backed by maps. SQL statements are recorded; the probe query
/// (`LIMIT 3`) and every other statement can be answered separately.
#[derive(Default)]
pub struct FakeCatalog {
    pub datasets: Vec<String>,
    pub fail_listing: bool,
    pub bundles: HashMap<String, ResourceBundle>,
    pub fields: Vec<FieldDescriptor>,
    pub rows: Vec<Record>,
    pub fail_probe: bool,
    pub executed: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new(datasets: &[&str]) -> Self {
        Self {
            datasets: datasets.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_bundle(mut self, dataset: &str, state: &str, resource_ids: &[&str]) -> Self {
        let resources = resource_ids
            .iter()
            .map(|id| ResourceDescriptor {
                id: id.to_string(),
                name: Some(format!("Tabela {}", id)),
                format: Some("CSV".to_string()),
                ..Default::default()
            })
            .collect();
        self.bundles.insert(
            dataset.to_string(),
            ResourceBundle {
                state: state.to_string(),
                resources,
            },
        );
        self
    }

    pub fn with_fields(mut self, names: &[&str]) -> Self {
        self.fields = names
            .iter()
            .map(|n| FieldDescriptor {
                id: n.to_string(),
                field_type: "text".to_string(),
            })
            .collect();
        self
    }

    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows.into_iter().map(record).collect();
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Record::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_dataset_names(&self) -> Result<Vec<String>, CatalogError> {
        if self.fail_listing {
            return Err(CatalogError::Api("listing disabled".to_string()));
        }
        Ok(self.datasets.clone())
    }

    async fn fetch_resource_bundle(
        &self,
        dataset: &str,
    ) -> Result<Option<ResourceBundle>, CatalogError> {
        Ok(self.bundles.get(dataset).cloned())
    }

    async fn query_sql(&self, sql: &str) -> Result<SqlResult, CatalogError> {
        self.executed.lock().unwrap().push(sql.to_string());
        let is_probe = sql.ends_with("LIMIT 3");
        if is_probe && self.fail_probe {
            return Err(CatalogError::Status {
                status: 409,
                body: "datastore unavailable".to_string(),
            });
        }
        Ok(SqlResult {
            fields: self.fields.clone(),
            records: self.rows.clone(),
        })
    }
}

// ─── Scripted model ─────────────────────────────────────────────────

/// Which prompt a completion request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dataset,
    Resource,
    Sql,
    Narration,
    Classifier,
    Conversation,
    Persona,
}

impl Stage {
    pub fn of(request: &CompletionRequest) -> Self {
        let system = request.system.as_str();
        if system.contains("Dataset recomendado:") {
            Stage::Dataset
        } else if system.contains("Resource index:") {
            Stage::Resource
        } else if system.contains("especialista em SQL") {
            Stage::Sql
        } else if system.contains("responde perguntas com dados oficiais") {
            Stage::Narration
        } else if system.contains("classificador de mensagens") {
            Stage::Classifier
        } else if system.contains("Seu nome é Ana\n") {
            Stage::Conversation
        } else {
            Stage::Persona
        }
    }
}

type Script = Box<dyn Fn(Stage, &CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

/// A model whose replies are computed by a closure from the request's stage.
/// Every request is recorded for later assertions.
pub struct ScriptedModel {
    script: Script,
    calls: Mutex<Vec<(Stage, CompletionRequest)>>,
}

impl ScriptedModel {
    pub fn new(
        script: impl Fn(Stage, &CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A model that fails every call.
    pub fn failing() -> Self {
        Self::new(|_, _| Err(LlmError::Other("offline".to_string())))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    pub fn requests_for(&self, stage: Stage) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let stage = Stage::of(request);
        self.calls.lock().unwrap().push((stage, request.clone()));
        (self.script)(stage, request)
    }
}

/// The happy-path catalog used by several tests: one dataset with a single
/// resource, three fields and two rows.
pub fn schools_catalog() -> FakeCatalog {
    FakeCatalog::new(&["escolas-municipais", "transporte-publico"])
        .with_bundle("escolas-municipais", "active", &["abc123"])
        .with_fields(&["_id", "nome", "bairro"])
        .with_rows(vec![
            json!({"_id": 1, "nome": "Escola A", "bairro": "Boa Vista"}),
            json!({"_id": 2, "nome": "Escola B", "bairro": "Derby"}),
        ])
}

/// Replies that carry a question through the pipeline successfully.
pub fn happy_reply(stage: Stage, _request: &CompletionRequest) -> Result<String, LlmError> {
    Ok(match stage {
        Stage::Dataset => "<think>escolas...</think>\nDataset recomendado: escolas-municipais".into(),
        Stage::Resource => "Resource index: 0".into(),
        Stage::Sql => "```sql\nSELECT \"nome\" FROM \"abc123\" LIMIT 100;\n```".into(),
        Stage::Narration => "<think>contando</think>Existem 2 escolas.".into(),
        Stage::Classifier => "CLASSIFICAÇÃO: QUERY\nCONFIANÇA: 90".into(),
        Stage::Conversation => "Olá! Sou a Ana.".into(),
        Stage::Persona => "Resposta da persona.".into(),
    })
}
