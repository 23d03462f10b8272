//! Core data models used throughout the assistant.
//!
//! These types represent the catalog entities, the pipeline's intermediate
//! state, and the chat-side records that flow between the router and the
//! personas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::personas::Persona;

/// One result row: an open-ended column → value map.
pub type Record = Map<String, Value>;

/// A dataset's resource listing as returned by `package_show`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceBundle {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

impl ResourceBundle {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

/// A single table (resource) belonging to a dataset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<Value>,
}

impl ResourceDescriptor {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// A column as reported by `datastore_search_sql`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
}

/// Sampled shape of a resource, used only to ground SQL generation.
///
/// An empty `fields` list means the probe failed; it is a valid, degraded
/// state rather than an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceMetadata {
    pub fields: Vec<FieldDescriptor>,
    pub examples: Vec<Record>,
}

impl ResourceMetadata {
    pub fn is_degraded(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Raw result of a `datastore_search_sql` call.
#[derive(Debug, Clone, Default)]
pub struct SqlResult {
    pub fields: Vec<FieldDescriptor>,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSelection {
    pub dataset: String,
}

/// The resource picked for a dataset. `resource_id` always comes from that
/// dataset's bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSelection {
    pub dataset: String,
    pub resource_id: String,
    pub resource_name: String,
    /// Position of the resource in the bundle.
    pub index: usize,
}

/// State threaded through one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub question: String,
    pub dataset: Option<String>,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub sql: Option<String>,
    pub rows: Vec<Record>,
    pub answer: Option<String>,
}

impl PipelineResult {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            ..Default::default()
        }
    }
}

/// The result handed back by `answer_query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub dataset: Option<String>,
    pub resource: Option<String>,
    pub sql_query: Option<String>,
    /// At most [`QueryAnswer::MAX_SAMPLE_ROWS`] rows.
    pub data: Vec<Record>,
}

impl QueryAnswer {
    pub const MAX_SAMPLE_ROWS: usize = 10;

    pub fn from_result(result: PipelineResult) -> Self {
        let mut data = result.rows;
        data.truncate(Self::MAX_SAMPLE_ROWS);
        Self {
            answer: result.answer.unwrap_or_default(),
            dataset: result.dataset,
            resource: result.resource_name,
            sql_query: result.sql,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message in the language-model request format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A recorded message in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub conversation_id: String,
    pub persona: Persona,
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(conversation_id: &str, persona: Persona, role: Role, content: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            persona,
            role,
            content: content.to_string(),
            at: Utc::now(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "QUERY")]
    Query,
    #[serde(rename = "CHAT")]
    Chat,
}

/// Outcome of classifying one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationVerdict {
    pub label: Label,
    /// 0–100. Only meaningful when `label` is [`Label::Query`].
    pub confidence: u8,
}

impl ClassificationVerdict {
    /// Fixed threshold; a verdict must be strictly above it to count as a query.
    pub const QUERY_THRESHOLD: u8 = 60;

    /// The verdict used whenever classification cannot be performed.
    pub fn fallback() -> Self {
        Self {
            label: Label::Chat,
            confidence: 50,
        }
    }

    pub fn is_query(&self) -> bool {
        self.label == Label::Query && self.confidence > Self::QUERY_THRESHOLD
    }
}

/// Final product of routing one chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub conversation_id: String,
    pub used_pipeline: bool,
    pub persona: Persona,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_query_threshold_is_strict() {
        let at = ClassificationVerdict {
            label: Label::Query,
            confidence: 60,
        };
        assert!(!at.is_query());
        let above = ClassificationVerdict {
            label: Label::Query,
            confidence: 61,
        };
        assert!(above.is_query());
        let chat = ClassificationVerdict {
            label: Label::Chat,
            confidence: 100,
        };
        assert!(!chat.is_query());
        assert!(!ClassificationVerdict::fallback().is_query());
    }

    #[test]
    fn test_bundle_tolerates_nulls() {
        let bundle: ResourceBundle = serde_json::from_value(json!({
            "state": "active",
            "resources": [
                { "id": "r1", "name": null, "format": "CSV", "description": null, "size": null },
                { "id": "r2", "name": "Linhas", "size": 1024 }
            ]
        }))
        .unwrap();
        assert!(bundle.is_active());
        assert_eq!(bundle.resources.len(), 2);
        assert_eq!(bundle.resources[0].display_name(), "");
        assert_eq!(bundle.resources[1].display_name(), "Linhas");
    }

    #[test]
    fn test_query_answer_caps_rows() {
        let mut result = PipelineResult::new("q");
        result.rows = (0..25)
            .map(|i| {
                let mut r = Record::new();
                r.insert("n".into(), json!(i));
                r
            })
            .collect();
        result.answer = Some("a".into());
        let answer = QueryAnswer::from_result(result);
        assert_eq!(answer.data.len(), QueryAnswer::MAX_SAMPLE_ROWS);
        assert_eq!(answer.answer, "a");
    }
}
