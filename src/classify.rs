//! QUERY/CHAT classification of chat messages.
//!
//! The classifier answers in a two-line grammar:
//!
//! ```text
//! CLASSIFICAÇÃO: QUERY
//! CONFIANÇA: 85
//! ```
//!
//! Missing or unparseable lines keep their defaults (CHAT, 50). A model
//! failure yields [`ClassificationVerdict::fallback`].

use tracing::{debug, warn};

use crate::models::{ClassificationVerdict, Label};
use crate::traits::{CompletionRequest, LanguageModel, ModelTier};

const LABEL_MARKER: &str = "CLASSIFICAÇÃO:";
const CONFIDENCE_MARKER: &str = "CONFIANÇA:";

const CLASSIFIER_PROMPT: &str = "Você é um classificador de mensagens que determina se um texto é:
1. Uma pergunta sobre dados de Recife (QUERY)
2. Uma mensagem conversacional (CHAT)

REGRAS:
- Classifique como QUERY se a mensagem contém perguntas sobre dados, estatísticas, informações factuais sobre Recife
- Classifique como CHAT se a mensagem é saudação, conversa casual, pergunta sobre o sistema, ou não relacionada a dados de Recife

Responda apenas com o formato:
CLASSIFICAÇÃO: [QUERY ou CHAT]
CONFIANÇA: [0-100]";

pub async fn classify(model: &dyn LanguageModel, message: &str) -> ClassificationVerdict {
    let request =
        CompletionRequest::new(ModelTier::Chat, CLASSIFIER_PROMPT, message.to_string(), 0.0);
    match model.complete(&request).await {
        Ok(reply) => {
            debug!(reply = %reply, "classifier reply");
            parse_verdict(&reply)
        }
        Err(e) => {
            warn!(error = %e, "classification failed, treating message as chat");
            ClassificationVerdict::fallback()
        }
    }
}

fn clean_value(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '*' | '`' | '%'))
        .trim()
}

pub fn parse_verdict(reply: &str) -> ClassificationVerdict {
    let mut verdict = ClassificationVerdict::fallback();
    for line in reply.lines() {
        if let Some((_, value)) = line.split_once(LABEL_MARKER) {
            verdict.label = if clean_value(value).eq_ignore_ascii_case("QUERY") {
                Label::Query
            } else {
                Label::Chat
            };
        } else if let Some((_, value)) = line.split_once(CONFIDENCE_MARKER) {
            if let Ok(confidence) = clean_value(value).parse::<u32>() {
                verdict.confidence = confidence.min(100) as u8;
            }
        }
    }
    verdict
}
