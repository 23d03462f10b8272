//! Natural-language answers from query results.

use tracing::{info, warn};

use crate::llm::strip_reasoning;
use crate::models::Record;
use crate::traits::{CompletionRequest, LanguageModel, ModelTier};

/// Returned verbatim when the query produced no rows.
pub const NO_DATA_ANSWER: &str =
    "Não foi possível encontrar dados relevantes para responder à sua pergunta.";

/// Rows sent to the model.
pub const MAX_CONTEXT_ROWS: usize = 20;
/// Rows dumped when the model is unavailable.
pub const MAX_DUMP_ROWS: usize = 5;

const NARRATION_PROMPT: &str = "Você é um assistente oficial do Recife que responde perguntas com dados oficiais.

INSTRUÇÕES:
1. Responda diretamente à pergunta usando apenas os dados fornecidos
2. Destaque informações mais relevantes dos dados
3. Use linguagem clara e natural, como um funcionário municipal falaria
4. Inclua números específicos quando relevantes
5. Se os dados forem insuficientes, informe isso claramente";

/// Answer `question` from `rows`.
///
/// Never fails: no rows gives [`NO_DATA_ANSWER`] without a model call, and a
/// model failure gives a JSON dump of the first rows.
pub async fn narrate(model: &dyn LanguageModel, question: &str, rows: &[Record]) -> String {
    if rows.is_empty() {
        warn!("no rows to narrate");
        return NO_DATA_ANSWER.to_string();
    }

    let context = &rows[..rows.len().min(MAX_CONTEXT_ROWS)];
    let request = CompletionRequest::new(
        ModelTier::Reasoning,
        NARRATION_PROMPT,
        format!(
            "Pergunta: {}\n\nDados obtidos: {}",
            question,
            serde_json::to_string(context).unwrap_or_default()
        ),
        0.6,
    );

    match model.complete(&request).await {
        Ok(reply) => {
            info!(rows = rows.len(), "answer narrated");
            strip_reasoning(&reply)
        }
        Err(e) => {
            warn!(error = %e, "narration failed, returning raw rows");
            raw_dump(rows)
        }
    }
}

fn raw_dump(rows: &[Record]) -> String {
    let head = &rows[..rows.len().min(MAX_DUMP_ROWS)];
    format!(
        "Com base nos dados obtidos: {}",
        serde_json::to_string_pretty(head).unwrap_or_default()
    )
}
