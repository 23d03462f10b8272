//! Conversational personas.
//!
//! A persona is a system instruction plus a display name. All personas
//! share one implementation, [`PersonaAgent`], and are selected through the
//! closed [`Persona`] enum by their domain tag.
//!
//! | Tag | Persona | Display name |
//! |-----|---------|--------------|
//! | `CULTURA` | culture, events, heritage | AnaCultura |
//! | `SERVICOS` | municipal public services | AnaCultura (Serviços) |
//! | `MOBILIDADE` | transit and mobility | AnaMobi |
//! | `SAUDE` | health and well-being | AnaCuida |
//! | `GERAL` | general assistant (default) | AssistenteRecife |
//!
//! Tags are matched case-insensitively; anything else resolves to `GERAL`.
//!
//! [`ConversationHandler`] is separate from the personas. It is the last
//! rung of the router's fallback ladder and never fails.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::llm::strip_reasoning;
use crate::models::Message;
use crate::traits::{CompletionRequest, LanguageModel, ModelTier};

/// Temperature for free-form persona and conversation replies.
pub const CHAT_TEMPERATURE: f32 = 0.7;

// ═══════════════════════════════════════════════════════════════════════
// Persona
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Persona {
    #[serde(rename = "CULTURA")]
    Culture,
    #[serde(rename = "SERVICOS")]
    PublicServices,
    #[serde(rename = "MOBILIDADE")]
    Mobility,
    #[serde(rename = "SAUDE")]
    Health,
    #[serde(rename = "GERAL")]
    General,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::Culture,
        Persona::PublicServices,
        Persona::Mobility,
        Persona::Health,
        Persona::General,
    ];

    /// Resolve a domain tag. Missing or unknown tags give [`Persona::General`].
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_uppercase()).as_deref() {
            Some("CULTURA") => Persona::Culture,
            Some("SERVICOS") => Persona::PublicServices,
            Some("MOBILIDADE") => Persona::Mobility,
            Some("SAUDE") => Persona::Health,
            _ => Persona::General,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Persona::Culture => "CULTURA",
            Persona::PublicServices => "SERVICOS",
            Persona::Mobility => "MOBILIDADE",
            Persona::Health => "SAUDE",
            Persona::General => "GERAL",
        }
    }

    pub fn descriptor(&self) -> &'static PersonaDescriptor {
        match self {
            Persona::Culture => &CULTURE,
            Persona::PublicServices => &PUBLIC_SERVICES,
            Persona::Mobility => &MOBILITY,
            Persona::Health => &HEALTH,
            Persona::General => &GENERAL,
        }
    }

    pub fn agent(&self) -> PersonaAgent {
        PersonaAgent {
            persona: *self,
            descriptor: self.descriptor(),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What distinguishes one persona from another.
#[derive(Debug)]
pub struct PersonaDescriptor {
    pub display_name: &'static str,
    pub system_prompt: &'static str,
}

static CULTURE: PersonaDescriptor = PersonaDescriptor {
    display_name: "AnaCultura",
    system_prompt: "Você é AnaCultura Agente Cultural do Recife, especializado em:
- Eventos culturais e festivais da cidade
- Patrimônio histórico e pontos turísticos
- Equipamentos culturais (teatros, museus, bibliotecas)
- Manifestações culturais populares (frevo, maracatu, etc.)

Ao responder:
- Dê prioridade a informações sobre eventos atuais e locais culturais
- Destaque a importância histórica dos locais, quando relevante
- Sugira roteiros culturais relacionados à pergunta
- Mencione horários de funcionamento e valores se forem conhecidos

Seja amigável, entusiasta e demonstre conhecimento profundo sobre a cultura recifense.",
};

static PUBLIC_SERVICES: PersonaDescriptor = PersonaDescriptor {
    display_name: "AnaCultura (Serviços)",
    system_prompt: "Você é a AnaCultura, Agente de Serviços Públicos do Recife, especializado em:
- Serviços municipais e como acessá-los
- Programas sociais e critérios de elegibilidade
- Procedimentos administrativos municipais
- Atendimento ao cidadão e canais de comunicação

Ao responder:
- Forneça informações precisas sobre como acessar os serviços
- Indique documentação necessária e prazos quando relevante
- Mencione alternativas digitais para serviços presenciais
- Oriente sobre direitos do cidadão relacionados aos serviços

Seja claro, objetivo e demonstre conhecimento técnico sobre a administração municipal.",
};

static MOBILITY: PersonaDescriptor = PersonaDescriptor {
    display_name: "AnaMobi",
    system_prompt: "Você é a AnaMobi, Agente de Mobilidade do Recife, especializado em:
- Transporte público (ônibus, metrô, BRT)
- Ciclovias e mobilidade ativa
- Trânsito e condições das vias
- Projetos de mobilidade urbana

Ao responder:
- Forneça informações atualizadas sobre linhas e horários
- Sugira rotas otimizadas considerando tempo e conforto
- Mencione alternativas de transporte quando relevante
- Indique aplicativos e recursos úteis para mobilidade

Seja pragmático, eficiente e demonstre conhecimento técnico sobre a mobilidade urbana.",
};

static HEALTH: PersonaDescriptor = PersonaDescriptor {
    display_name: "AnaCuida",
    system_prompt: "Você é AnaCuida, Agente de Saúde e Bem-estar do Recife, especializado em:
- Unidades de saúde e serviços disponíveis
- Academias da cidade e atividades físicas públicas
- Dados epidemiológicos e campanhas de saúde
- Programas de bem-estar e qualidade de vida

Ao responder:
- Forneça informações precisas sobre locais e horários de atendimento
- Oriente sobre o acesso a serviços de saúde específicos
- Mencione programas de prevenção relacionados à pergunta
- Incentive hábitos saudáveis com recomendações práticas

Seja atencioso, informativo e demonstre conhecimento técnico sobre saúde pública.",
};

static GENERAL: PersonaDescriptor = PersonaDescriptor {
    display_name: "AssistenteRecife",
    system_prompt: "Você é um assistente virtual para a cidade do Recife.

SOBRE VOCÊ:
- Seu nome é AssistenteRecife
- Seu propósito é ajudar cidadãos a encontrar informações sobre a cidade
- Você tem acesso a bancos de dados oficiais da cidade

COMPORTAMENTO:
- Seja claro, amigável e direto
- Quando não souber responder, sugira que o usuário faça uma pergunta específica sobre dados de Recife
- Explique que você pode consultar dados como estatísticas, serviços públicos, equipamentos urbanos, etc.
- Não invente dados que não possui",
};

/// Serializable persona info for listings.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaInfo {
    pub tag: &'static str,
    pub display_name: &'static str,
}

pub fn list_personas() -> Vec<PersonaInfo> {
    Persona::ALL
        .iter()
        .map(|p| PersonaInfo {
            tag: p.tag(),
            display_name: p.descriptor().display_name,
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// PersonaAgent
// ═══════════════════════════════════════════════════════════════════════

/// A persona bound to its descriptor, ready to answer.
#[derive(Debug, Clone, Copy)]
pub struct PersonaAgent {
    persona: Persona,
    descriptor: &'static PersonaDescriptor,
}

impl PersonaAgent {
    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn display_name(&self) -> &'static str {
        self.descriptor.display_name
    }

    /// One model call with `history` (oldest first) before `question`.
    pub async fn answer(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        history: &[Message],
    ) -> Result<String, LlmError> {
        info!(
            persona = %self.persona,
            history = history.len(),
            "persona answering"
        );
        let request = chat_request(self.descriptor.system_prompt, question, history);
        let reply = model.complete(&request).await?;
        Ok(strip_reasoning(&reply))
    }
}

fn chat_request(system: &str, message: &str, history: &[Message]) -> CompletionRequest {
    let mut turns = history.to_vec();
    turns.push(Message::user(message));
    CompletionRequest {
        tier: ModelTier::Chat,
        system: system.to_string(),
        turns,
        temperature: CHAT_TEMPERATURE,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ConversationHandler
// ═══════════════════════════════════════════════════════════════════════

pub const CONVERSATION_APOLOGY: &str = "Desculpe, estou tendo dificuldades para processar sua mensagem. Como posso ajudá-lo com informações sobre o Recife?";

const CONVERSATION_PROMPT: &str = "Você é uma assistente virtual para a cidade do Recife.

SOBRE VOCÊ:
- Seu nome é Ana
- Seu propósito é ajudar cidadãos a encontrar informações sobre a cidade
- Você tem acesso a bancos de dados oficiais da cidade

COMPORTAMENTO:
- Seja clara, amigável e direta
- Quando não souber responder, sugira que o usuário faça uma pergunta específica sobre dados de Recife
- Explique que você pode consultar dados como estatísticas, serviços públicos, equipamentos urbanos, etc.
- Não invente dados que não possui";

/// Generic small-talk responder used when a persona fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConversationHandler;

impl ConversationHandler {
    /// Never fails; a model error yields [`CONVERSATION_APOLOGY`].
    pub async fn respond(
        &self,
        model: &dyn LanguageModel,
        message: &str,
        history: &[Message],
    ) -> String {
        let request = chat_request(CONVERSATION_PROMPT, message, history);
        match model.complete(&request).await {
            Ok(reply) => strip_reasoning(&reply),
            Err(e) => {
                warn!(error = %e, "conversation handler failed");
                CONVERSATION_APOLOGY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_case_insensitive() {
        assert_eq!(Persona::from_tag(Some("cultura")), Persona::Culture);
        assert_eq!(Persona::from_tag(Some(" Saude ")), Persona::Health);
        assert_eq!(Persona::from_tag(Some("MOBILIDADE")), Persona::Mobility);
        assert_eq!(Persona::from_tag(Some("servicos")), Persona::PublicServices);
    }

    #[test]
    fn test_unknown_tag_is_general() {
        assert_eq!(Persona::from_tag(Some("ESPORTES")), Persona::General);
        assert_eq!(Persona::from_tag(Some("")), Persona::General);
        assert_eq!(Persona::from_tag(None), Persona::General);
    }

    #[test]
    fn test_tags_roundtrip() {
        for p in Persona::ALL {
            assert_eq!(Persona::from_tag(Some(p.tag())), p);
        }
    }

    #[test]
    fn test_descriptors_distinct() {
        let names: std::collections::HashSet<_> = Persona::ALL
            .iter()
            .map(|p| p.descriptor().display_name)
            .collect();
        assert_eq!(names.len(), Persona::ALL.len());
        assert_eq!(list_personas().len(), 5);
    }

    #[test]
    fn test_chat_request_appends_message_after_history() {
        let history = vec![Message::user("oi"), Message::assistant("olá")];
        let req = chat_request("sys", "e agora?", &history);
        assert_eq!(req.turns.len(), 3);
        assert_eq!(req.turns[2], Message::user("e agora?"));
        assert_eq!(req.tier, ModelTier::Chat);
        assert!((req.temperature - CHAT_TEMPERATURE).abs() < f32::EPSILON);
    }
}
