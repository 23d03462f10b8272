//! Message routing tests: classification, pipeline attempts and the
//! persona fallback ladder.

mod common;

use async_trait::async_trait;
use common::{happy_reply, schools_catalog, FakeCatalog, ScriptedModel, Stage};
use recife_data::error::{CatalogError, LlmError};
use recife_data::history::InMemoryHistory;
use recife_data::models::{ResourceBundle, Role, SqlResult};
use recife_data::narrate::NO_DATA_ANSWER;
use recife_data::personas::{Persona, CONVERSATION_APOLOGY};
use recife_data::pipeline::QueryPipeline;
use recife_data::router::MessageRouter;
use recife_data::traits::{CatalogClient, CompletionRequest, ModelTier};
use std::sync::Arc;
use std::time::Duration;

fn router_with(model: &Arc<ScriptedModel>, catalog: impl CatalogClient + 'static) -> MessageRouter {
    let pipeline = QueryPipeline::new(model.clone(), Arc::new(catalog));
    MessageRouter::new(model.clone(), pipeline)
}

fn classified_as(
    reply: &'static str,
) -> impl Fn(Stage, &CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static {
    move |stage: Stage, req: &CompletionRequest| match stage {
        Stage::Classifier => Ok(reply.to_string()),
        _ => happy_reply(stage, req),
    }
}

#[tokio::test]
async fn test_confident_query_uses_pipeline() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, schools_catalog());

    let answer = router
        .answer_message("Quantas escolas municipais existem?", None, None)
        .await;

    assert_eq!(answer.answer, "Existem 2 escolas.");
    assert!(answer.used_pipeline);
    assert_eq!(answer.persona, Persona::General);
    assert_eq!(
        model.stages(),
        vec![Stage::Classifier, Stage::Dataset, Stage::Sql, Stage::Narration]
    );
    let classifier = &model.requests_for(Stage::Classifier)[0];
    assert_eq!(classifier.tier, ModelTier::Chat);
    assert_eq!(classifier.temperature, 0.0);
}

#[tokio::test]
async fn test_threshold_confidence_goes_to_persona() {
    let model = Arc::new(ScriptedModel::new(classified_as(
        "CLASSIFICAÇÃO: QUERY\nCONFIANÇA: 60",
    )));
    let router = router_with(&model, schools_catalog());

    let answer = router.answer_message("Escolas?", None, Some("GERAL")).await;

    assert_eq!(answer.answer, "Resposta da persona.");
    assert!(!answer.used_pipeline);
    assert!(model.requests_for(Stage::Dataset).is_empty());
    let persona_request = &model.requests_for(Stage::Persona)[0];
    assert!(persona_request.system.contains("AssistenteRecife"));
}

#[tokio::test]
async fn test_chat_verdict_goes_to_persona() {
    let model = Arc::new(ScriptedModel::new(classified_as(
        "CLASSIFICAÇÃO: CHAT\nCONFIANÇA: 95",
    )));
    let router = router_with(&model, schools_catalog());

    let answer = router.answer_message("Bom dia!", None, None).await;
    assert!(!answer.used_pipeline);
    assert_eq!(model.stages(), vec![Stage::Classifier, Stage::Persona]);
}

#[tokio::test]
async fn test_named_persona_skips_classification() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, schools_catalog());

    let answer = router
        .answer_message("Quantos museus existem?", None, Some("cultura"))
        .await;

    assert_eq!(answer.persona, Persona::Culture);
    assert!(!answer.used_pipeline);
    assert_eq!(model.stages(), vec![Stage::Persona]);
    let request = &model.requests_for(Stage::Persona)[0];
    assert!(request.system.contains("AnaCultura"));
    assert_eq!(request.tier, ModelTier::Chat);
    assert!((request.temperature - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn test_unknown_persona_is_general_and_classified() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, schools_catalog());

    let answer = router
        .answer_message("Quantas escolas?", None, Some("ESPORTES"))
        .await;
    assert_eq!(answer.persona, Persona::General);
    assert!(answer.used_pipeline);
}

#[tokio::test]
async fn test_pipeline_failure_falls_back_to_persona() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, FakeCatalog::new(&[]));

    let answer = router.answer_message("Quantas escolas?", None, None).await;

    assert_eq!(answer.answer, "Resposta da persona.");
    assert!(!answer.used_pipeline);
    assert_eq!(answer.persona, Persona::General);
}

#[tokio::test]
async fn test_failure_after_dataset_choice_falls_back_to_persona() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let catalog = schools_catalog().with_bundle("escolas-municipais", "deleted", &["abc123"]);
    let router = router_with(&model, catalog);

    let answer = router.answer_message("Quantas escolas?", None, None).await;

    assert_eq!(answer.answer, "Resposta da persona.");
    assert!(!answer.used_pipeline);
    assert_eq!(
        model.stages(),
        vec![Stage::Classifier, Stage::Dataset, Stage::Persona]
    );
}

#[tokio::test]
async fn test_failed_execution_still_answers_from_pipeline() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let catalog = schools_catalog().with_rows(vec![]);
    let router = router_with(&model, catalog);

    let answer = router.answer_message("Quantas escolas?", None, None).await;

    // An empty or failed execution is not a pipeline failure.
    assert_eq!(answer.answer, NO_DATA_ANSWER);
    assert!(answer.used_pipeline);
}

#[tokio::test]
async fn test_persona_failure_falls_back_to_conversation() {
    let model = Arc::new(ScriptedModel::new(|stage, req| match stage {
        Stage::Persona => Err(LlmError::Other("persona down".to_string())),
        _ => happy_reply(stage, req),
    }));
    let router = router_with(&model, schools_catalog());

    let answer = router
        .answer_message("Me fale do Recife", None, Some("MOBILIDADE"))
        .await;

    assert_eq!(answer.answer, "Olá! Sou a Ana.");
    assert_eq!(answer.persona, Persona::General);
    assert!(!answer.used_pipeline);

    let conversation = &model.requests_for(Stage::Conversation)[0];
    assert_eq!(conversation.tier, ModelTier::Chat);
    assert!((conversation.temperature - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn test_total_model_outage_still_answers() {
    let model = Arc::new(ScriptedModel::failing());
    let router = router_with(&model, schools_catalog());

    let answer = router.answer_message("Olá", Some("conv_x"), None).await;

    assert_eq!(answer.answer, CONVERSATION_APOLOGY);
    assert_eq!(answer.conversation_id, "conv_x");
    assert!(!answer.used_pipeline);
    // The failed classifier counts as chat: no pipeline attempt.
    assert!(model.requests_for(Stage::Dataset).is_empty());
}

#[tokio::test]
async fn test_conversation_ids() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, schools_catalog());

    let kept = router.answer_message("oi", Some("abc"), Some("SAUDE")).await;
    assert_eq!(kept.conversation_id, "abc");

    let minted = router.answer_message("oi", None, Some("SAUDE")).await;
    let blank = router.answer_message("oi", Some("  "), Some("SAUDE")).await;
    assert!(minted.conversation_id.starts_with("conv_"));
    assert!(blank.conversation_id.starts_with("conv_"));
    assert_ne!(minted.conversation_id, blank.conversation_id);
}

// ─── Pipeline deadline ──────────────────────────────────────────────

/// A catalog that never answers in time.
struct StalledCatalog;

#[async_trait]
impl CatalogClient for StalledCatalog {
    async fn fetch_dataset_names(&self) -> Result<Vec<String>, CatalogError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec!["escolas-municipais".to_string()])
    }

    async fn fetch_resource_bundle(
        &self,
        _dataset: &str,
    ) -> Result<Option<ResourceBundle>, CatalogError> {
        Ok(None)
    }

    async fn query_sql(&self, _sql: &str) -> Result<SqlResult, CatalogError> {
        Ok(SqlResult::default())
    }
}

#[tokio::test]
async fn test_pipeline_deadline_falls_back_to_persona() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router =
        router_with(&model, StalledCatalog).with_pipeline_timeout(Duration::from_millis(50));

    let answer = router.answer_message("Quantas escolas?", None, None).await;

    assert!(!answer.used_pipeline);
    assert_eq!(answer.answer, "Resposta da persona.");
}

// ─── History ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_disabled_by_default() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, schools_catalog());

    router.answer_message("oi", Some("c1"), Some("CULTURA")).await;
    router.answer_message("e aí?", Some("c1"), Some("CULTURA")).await;

    let requests = model.requests_for(Stage::Persona);
    assert_eq!(requests[1].turns.len(), 1);
}

#[tokio::test]
async fn test_history_feeds_personas() {
    let model = Arc::new(ScriptedModel::new(happy_reply));
    let router = router_with(&model, schools_catalog())
        .with_history(Box::new(InMemoryHistory::new(10)), 10);

    router.answer_message("oi", Some("c1"), Some("CULTURA")).await;
    router.answer_message("outra conversa", Some("c2"), Some("CULTURA")).await;
    router.answer_message("e aí?", Some("c1"), Some("CULTURA")).await;

    let requests = model.requests_for(Stage::Persona);
    let turns = &requests[2].turns;
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "oi");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Resposta da persona.");
    assert_eq!(turns[2].content, "e aí?");
}
