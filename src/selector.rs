//! Dataset and resource selection.
//!
//! The two selectors deliberately follow different failure policies:
//!
//! - [`select_dataset`] surfaces every problem. An empty catalog, a model
//!   error, or a reply without the `Dataset recomendado:` marker all end
//!   the pipeline with a [`PipelineError`].
//! - [`select_resource`] favours availability. Once the dataset is known to
//!   have resources, any trouble picking one (model error, unparseable or
//!   out-of-range index) silently selects the first resource.

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::models::{DatasetSelection, ResourceDescriptor, ResourceSelection};
use crate::traits::{CatalogClient, CompletionRequest, LanguageModel, ModelTier};

/// Only this many catalog entries are offered to the model.
pub const MAX_DATASETS_FOR_SELECTION: usize = 100;

const DATASET_MARKER: &str = "Dataset recomendado:";
const RESOURCE_MARKER: &str = "Resource index:";

const DATASET_PROMPT: &str = "Você é um especialista em dados do Recife que analisa datasets disponíveis.

INSTRUÇÕES IMPORTANTES:
1. Identifique EXATAMENTE UM dataset que melhor responda à pergunta do usuário
2. Escolha APENAS O NOME EXATO da lista de datasets fornecida
3. NÃO invente nomes de datasets
4. Responda em formato único e preciso
5. VERIFIQUE SE O SEU DATASET ESTÁ DISPONÍVEL NA LISTA

Dataset recomendado: [nome_exato_do_dataset]";

const RESOURCE_PROMPT: &str = "Identifique o índice do recurso mais relevante para a pergunta. Responda apenas:
Resource index: [número do índice]";

// ═══════════════════════════════════════════════════════════════════════
// Dataset selection
// ═══════════════════════════════════════════════════════════════════════

/// Ask the model to pick one dataset for `question`.
///
/// The chosen name is not checked against `dataset_names`; a wrong pick
/// shows up later as an unresolvable dataset.
pub async fn select_dataset(
    model: &dyn LanguageModel,
    question: &str,
    dataset_names: &[String],
) -> Result<DatasetSelection, PipelineError> {
    if dataset_names.is_empty() {
        return Err(PipelineError::CatalogUnavailable);
    }

    let offered = &dataset_names[..dataset_names.len().min(MAX_DATASETS_FOR_SELECTION)];
    if offered.len() < dataset_names.len() {
        debug!(
            total = dataset_names.len(),
            offered = offered.len(),
            "dataset list truncated for selection"
        );
    }

    let datasets_json = serde_json::to_string(offered).unwrap_or_else(|_| "[]".to_string());
    let request = CompletionRequest::new(
        ModelTier::Reasoning,
        DATASET_PROMPT,
        format!(
            "Pergunta: {}\n\nDatasets disponíveis:\n{}",
            question, datasets_json
        ),
        0.0,
    );

    let reply = model
        .complete(&request)
        .await
        .map_err(|e| PipelineError::MalformedSelection(format!("model call failed: {}", e)))?;
    debug!(reply = %reply, "dataset selection reply");

    match parse_dataset_reply(&reply) {
        Some(dataset) => {
            info!(dataset = %dataset, "dataset selected");
            Ok(DatasetSelection { dataset })
        }
        None => Err(PipelineError::MalformedSelection(format!(
            "reply has no '{}' line",
            DATASET_MARKER
        ))),
    }
}

/// Find the marker line and return the trimmed, unquoted value after it.
fn parse_dataset_reply(reply: &str) -> Option<String> {
    let line = reply.lines().find(|l| l.contains(DATASET_MARKER))?;
    let (_, value) = line.split_once(DATASET_MARKER)?;
    let name = value
        .replace('"', "")
        .trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '`' | '*'))
        .trim()
        .to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Resource selection
// ═══════════════════════════════════════════════════════════════════════

/// Pick one resource of `dataset` for `question`.
///
/// # Errors
///
/// [`PipelineError::DatasetUnresolvable`] if the bundle is missing,
/// inactive, or has no resources. Nothing else fails.
pub async fn select_resource(
    model: &dyn LanguageModel,
    catalog: &dyn CatalogClient,
    question: &str,
    dataset: &str,
) -> Result<ResourceSelection, PipelineError> {
    let resources = match catalog.get_resource_bundle(dataset).await {
        Some(bundle) if bundle.is_active() && !bundle.resources.is_empty() => bundle.resources,
        Some(bundle) => {
            warn!(
                dataset,
                state = %bundle.state,
                resources = bundle.resources.len(),
                "dataset inactive or without resources"
            );
            return Err(PipelineError::DatasetUnresolvable(dataset.to_string()));
        }
        None => return Err(PipelineError::DatasetUnresolvable(dataset.to_string())),
    };

    if resources.len() == 1 {
        info!(dataset, resource_id = %resources[0].id, "single resource, no selection needed");
        return Ok(selection(dataset, &resources, 0));
    }

    info!(dataset, count = resources.len(), "selecting among resources");
    let request = CompletionRequest::new(
        ModelTier::Reasoning,
        RESOURCE_PROMPT,
        format!(
            "Pergunta: {}\n\nRecursos disponíveis:\n{}",
            question,
            describe_resources(&resources)
        ),
        0.0,
    );

    let index = match model.complete(&request).await {
        Ok(reply) => {
            debug!(reply = %reply, "resource selection reply");
            parse_resource_reply(&reply, resources.len()).unwrap_or_else(|| {
                warn!("could not parse resource index, falling back to first resource");
                0
            })
        }
        Err(e) => {
            warn!(error = %e, "resource selection failed, falling back to first resource");
            0
        }
    };

    Ok(selection(dataset, &resources, index))
}

fn selection(dataset: &str, resources: &[ResourceDescriptor], index: usize) -> ResourceSelection {
    let resource = &resources[index];
    ResourceSelection {
        dataset: dataset.to_string(),
        resource_id: resource.id.clone(),
        resource_name: resource.display_name().to_string(),
        index,
    }
}

/// Render resources as `{"resource_0": {...}, ...}` for the prompt.
fn describe_resources(resources: &[ResourceDescriptor]) -> String {
    let mut map = Map::new();
    for (i, r) in resources.iter().enumerate() {
        map.insert(
            format!("resource_{}", i),
            json!({
                "resource_id": r.id,
                "formato_dataset": r.format.as_deref().unwrap_or(""),
                "nome_dataset": r.display_name(),
                "descricao_dataset": r.description.as_deref().unwrap_or(""),
                "tamanho_dataset": r.size.clone().unwrap_or(Value::String(String::new())),
            }),
        );
    }
    Value::Object(map).to_string()
}

/// Return the first in-range index found on a marker line.
fn parse_resource_reply(reply: &str, count: usize) -> Option<usize> {
    reply
        .lines()
        .filter_map(|line| line.split_once(RESOURCE_MARKER).map(|(_, v)| v))
        .filter_map(|value| {
            value
                .trim()
                .trim_matches(|c| matches!(c, '[' | ']' | '`' | '*' | '.'))
                .trim()
                .parse::<usize>()
                .ok()
        })
        .find(|&i| i < count)
}
