//! Collaborator traits for the data catalog and the language model.
//!
//! The pipeline and the router never talk HTTP directly. They depend on
//! these two traits, which keeps every stage testable with in-memory fakes
//! and lets a deployment swap the CKAN client or the model provider
//! without touching the core.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐        ┌──────────────────┐
//! │ MessageRouter│───────▶│  QueryPipeline   │
//! └──────┬───────┘        └───┬──────────┬───┘
//!        │                    │          │
//!        ▼                    ▼          ▼
//! ┌──────────────┐    ┌──────────────┐ ┌──────────────┐
//! │ LanguageModel│◀───│ stages       │ │ CatalogClient│
//! │ (Groq/OpenAI)│    │ select/sql/… │ │ (CKAN)       │
//! └──────────────┘    └──────────────┘ └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use recife_data::error::LlmError;
//! use recife_data::traits::{CompletionRequest, LanguageModel};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl LanguageModel for Echo {
//!     async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
//!         Ok(request.turns.last().map(|m| m.content.clone()).unwrap_or_default())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tracing::warn;

use crate::error::{CatalogError, LlmError};
use crate::models::{Message, Record, ResourceBundle, SqlResult};

// ═══════════════════════════════════════════════════════════════════════
// Catalog Client
// ═══════════════════════════════════════════════════════════════════════

/// Read access to an open-data catalog.
///
/// Implementors provide the three fallible `fetch_*`/`query_sql` methods.
/// The provided methods wrap them with the lenient semantics the pipeline
/// expects: failures become an empty listing, an absent bundle, or an
/// empty row set, and are logged at warn level.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Returns every dataset name in catalog order.
    async fn fetch_dataset_names(&self) -> Result<Vec<String>, CatalogError>;

    /// Returns the resource bundle of a dataset, or `None` if the catalog
    /// does not know the name.
    async fn fetch_resource_bundle(
        &self,
        dataset: &str,
    ) -> Result<Option<ResourceBundle>, CatalogError>;

    /// Runs a SQL statement against the datastore.
    async fn query_sql(&self, sql: &str) -> Result<SqlResult, CatalogError>;

    /// Dataset names, or an empty list on any failure.
    async fn list_datasets(&self) -> Vec<String> {
        match self.fetch_dataset_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "dataset listing failed");
                Vec::new()
            }
        }
    }

    /// The dataset's resource bundle, or `None` on any failure.
    async fn get_resource_bundle(&self, dataset: &str) -> Option<ResourceBundle> {
        match self.fetch_resource_bundle(dataset).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(dataset, error = %e, "resource bundle lookup failed");
                None
            }
        }
    }

    /// Result rows, or an empty list on any failure.
    async fn run_sql(&self, sql: &str) -> Vec<Record> {
        match self.query_sql(sql).await {
            Ok(result) => result.records,
            Err(e) => {
                warn!(error = %e, "SQL execution failed");
                Vec::new()
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Language Model
// ═══════════════════════════════════════════════════════════════════════

/// Which configured model a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// The pipeline model: dataset/resource selection, SQL, narration.
    Reasoning,
    /// The conversational model: classification, personas, small talk.
    Chat,
}

/// A single, non-streaming completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub tier: ModelTier,
    pub system: String,
    pub turns: Vec<Message>,
    pub temperature: f32,
}

impl CompletionRequest {
    /// A request with one system instruction and one user turn.
    pub fn new(tier: ModelTier, system: &str, user: String, temperature: f32) -> Self {
        Self {
            tier,
            system: system.to_string(),
            turns: vec![Message::user(user)],
            temperature,
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends the request and returns the raw reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}
