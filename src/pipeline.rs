//! The natural-language-to-data pipeline.
//!
//! ```text
//! question
//!    │
//!    ▼
//! select_dataset ──▶ select_resource ──▶ probe ──▶ synthesize ──▶ run_sql ──▶ narrate
//!    │                    │
//!    └─ PipelineError ◀───┘   (every later stage degrades locally)
//! ```
//!
//! Stages run strictly in sequence; each consumes the previous one's
//! output. Only the two selection stages can fail the run. The metadata
//! probe, SQL synthesis, execution and narration each substitute a
//! deterministic fallback instead.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::models::{PipelineResult, QueryAnswer};
use crate::narrate::narrate;
use crate::probe::probe;
use crate::selector::{select_dataset, select_resource};
use crate::sql::synthesize;
use crate::traits::{CatalogClient, LanguageModel};

#[derive(Clone)]
pub struct QueryPipeline {
    model: Arc<dyn LanguageModel>,
    catalog: Arc<dyn CatalogClient>,
}

impl QueryPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self { model, catalog }
    }

    pub fn catalog(&self) -> &dyn CatalogClient {
        self.catalog.as_ref()
    }

    /// Run every stage for `question` and return the full trace.
    pub async fn run(&self, question: &str) -> Result<PipelineResult, PipelineError> {
        let model = self.model.as_ref();
        let catalog = self.catalog.as_ref();
        let mut result = PipelineResult::new(question);

        let started = Instant::now();
        let names = catalog.list_datasets().await;
        let dataset = select_dataset(model, question, &names).await?;
        info!(
            step = 1,
            dataset = %dataset.dataset,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dataset selection completed"
        );
        result.dataset = Some(dataset.dataset.clone());

        let started = Instant::now();
        let resource = select_resource(model, catalog, question, &dataset.dataset).await?;
        info!(
            step = 2,
            resource_id = %resource.resource_id,
            resource_name = %resource.resource_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resource selection completed"
        );
        result.resource_id = Some(resource.resource_id.clone());
        result.resource_name = Some(resource.resource_name.clone());

        let started = Instant::now();
        let metadata = probe(catalog, &resource.resource_id).await;
        info!(
            step = 3,
            fields = metadata.fields.len(),
            samples = metadata.examples.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "metadata fetched"
        );

        let started = Instant::now();
        let sql = synthesize(model, question, &resource.resource_id, &metadata).await;
        info!(
            step = 4,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "SQL generation completed"
        );
        debug!(sql = %sql, "final SQL");

        let started = Instant::now();
        let rows = catalog.run_sql(&sql).await;
        info!(
            step = 5,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query execution completed"
        );
        result.sql = Some(sql);

        let started = Instant::now();
        let answer = narrate(model, question, &rows).await;
        info!(
            step = 6,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer generation completed"
        );
        result.rows = rows;
        result.answer = Some(answer);

        Ok(result)
    }

    /// Answer `question` and keep only a small sample of rows.
    pub async fn answer_query(&self, question: &str) -> Result<QueryAnswer, PipelineError> {
        self.run(question).await.map(QueryAnswer::from_result)
    }
}
