//! Chat message routing.
//!
//! Each inbound message moves through `RECEIVED → CLASSIFIED → ROUTED →
//! ANSWERED`:
//!
//! 1. **Classify.** Only messages addressed to the general persona are
//!    classified; a named persona always means conversation.
//! 2. **Route.** A confident QUERY verdict runs the [`QueryPipeline`] under
//!    a deadline. Any pipeline failure, including the deadline expiring,
//!    drops the message through to the persona.
//! 3. **Answer.** The persona answers. If the persona call itself fails,
//!    the generic [`ConversationHandler`] answers instead, and it cannot
//!    fail.
//!
//! [`MessageRouter::answer_message`] therefore always returns an answer.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::classify;
use crate::config::Config;
use crate::error::PipelineError;
use crate::history::{self, DisabledHistory, HistoryStore};
use crate::models::{ChatAnswer, ConversationTurn, Message, QueryAnswer, Role};
use crate::personas::{ConversationHandler, Persona};
use crate::pipeline::QueryPipeline;
use crate::traits::LanguageModel;

const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct MessageRouter {
    model: Arc<dyn LanguageModel>,
    pipeline: QueryPipeline,
    conversation: ConversationHandler,
    history: Box<dyn HistoryStore>,
    history_limit: usize,
    pipeline_timeout: Duration,
}

impl MessageRouter {
    /// A router with history disabled and the default pipeline deadline.
    pub fn new(model: Arc<dyn LanguageModel>, pipeline: QueryPipeline) -> Self {
        Self {
            model,
            pipeline,
            conversation: ConversationHandler,
            history: Box::new(DisabledHistory),
            history_limit: 0,
            pipeline_timeout: DEFAULT_PIPELINE_TIMEOUT,
        }
    }

    pub fn from_config(
        config: &Config,
        model: Arc<dyn LanguageModel>,
        pipeline: QueryPipeline,
    ) -> Self {
        Self::new(model, pipeline)
            .with_history(history::from_config(&config.history), config.history.max_turns * 2)
            .with_pipeline_timeout(Duration::from_secs(config.router.pipeline_timeout_secs))
    }

    /// Use `store`, showing personas at most `limit` previous messages.
    pub fn with_history(mut self, store: Box<dyn HistoryStore>, limit: usize) -> Self {
        self.history = store;
        self.history_limit = limit;
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = timeout;
        self
    }

    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// Answer one chat message. Never fails.
    ///
    /// `conversation_id` is reused when given (and non-blank); otherwise a
    /// fresh `conv_<uuid>` id is minted.
    pub async fn answer_message(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        persona_tag: Option<&str>,
    ) -> ChatAnswer {
        let request_id = short_request_id();
        let span = info_span!("message", request_id = %request_id);
        self.route(message, conversation_id, persona_tag)
            .instrument(span)
            .await
    }

    async fn route(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        persona_tag: Option<&str>,
    ) -> ChatAnswer {
        let conversation_id = conversation_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(mint_conversation_id);
        let persona = Persona::from_tag(persona_tag);
        info!(conversation_id = %conversation_id, persona = %persona, "message received");

        let history: Vec<Message> = self
            .history
            .recent_turns(&conversation_id, self.history_limit)
            .iter()
            .map(ConversationTurn::to_message)
            .collect();
        self.history.append_turn(ConversationTurn::new(
            &conversation_id,
            persona,
            Role::User,
            message,
        ));

        let is_query = if persona == Persona::General {
            let verdict = classify(self.model.as_ref(), message).await;
            info!(
                label = ?verdict.label,
                confidence = verdict.confidence,
                is_query = verdict.is_query(),
                "message classified"
            );
            verdict.is_query()
        } else {
            false
        };

        if is_query {
            match self.try_pipeline(message).await {
                Ok(answer) => {
                    info!(dataset = ?answer.dataset, "answered from data pipeline");
                    return self.finish(conversation_id, persona, answer.answer, true);
                }
                Err(e) => warn!(error = %e, "data pipeline failed, falling back to persona"),
            }
        }

        let agent = persona.agent();
        match agent.answer(self.model.as_ref(), message, &history).await {
            Ok(answer) => {
                info!(persona = agent.display_name(), "answered by persona");
                self.finish(conversation_id, persona, answer, false)
            }
            Err(e) => {
                warn!(error = %e, persona = %persona, "persona failed, using conversation handler");
                let answer = self
                    .conversation
                    .respond(self.model.as_ref(), message, &history)
                    .await;
                self.finish(conversation_id, Persona::General, answer, false)
            }
        }
    }

    async fn try_pipeline(&self, message: &str) -> Result<QueryAnswer, PipelineError> {
        match tokio::time::timeout(self.pipeline_timeout, self.pipeline.answer_query(message)).await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.pipeline_timeout.as_secs())),
        }
    }

    fn finish(
        &self,
        conversation_id: String,
        persona: Persona,
        answer: String,
        used_pipeline: bool,
    ) -> ChatAnswer {
        self.history.append_turn(ConversationTurn::new(
            &conversation_id,
            persona,
            Role::Assistant,
            &answer,
        ));
        ChatAnswer {
            answer,
            conversation_id,
            used_pipeline,
            persona,
        }
    }
}

fn mint_conversation_id() -> String {
    format!("conv_{}", Uuid::new_v4().simple())
}

/// Eight hex characters, enough to correlate log lines of one request.
pub fn short_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
