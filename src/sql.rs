//! SQL generation and sanitizing.
//!
//! [`synthesize`] asks the reasoning model for a single `SELECT` against the
//! chosen resource, then runs the reply through [`sanitize_sql`]. The
//! sanitizer is a best-effort textual repair, not a SQL parser. It knows
//! four patterns, applied in order:
//!
//! 1. A reply that does not start with `SELECT` is replaced by a query
//!    naming the first ten fields explicitly.
//! 2. A missing `FROM "<resource_id>"` is injected right after the first
//!    `FROM` keyword (or before the first trailing clause if there is no
//!    `FROM` at all).
//! 3. A missing `LIMIT` gets ` LIMIT 100` appended.
//! 4. A resource reference duplicated by step 2 (`FROM "id" "id"`, or the
//!    prompt's `"resource_id"` placeholder) is collapsed.
//!
//! Each step leaves already-correct queries untouched, so the sanitizer is
//! idempotent.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::llm::strip_reasoning;
use crate::models::ResourceMetadata;
use crate::traits::{CompletionRequest, LanguageModel, ModelTier};

pub const ROW_LIMIT: usize = 100;
/// Fields named explicitly by the fallback query.
pub const FALLBACK_FIELDS: usize = 10;

/// Placeholder the prompt itself uses; models sometimes echo it.
const RESOURCE_PLACEHOLDER: &str = "resource_id";

const SQL_PROMPT: &str = "Você é um especialista em SQL. Gere uma consulta SQL válida seguindo essas regras:

1. SEMPRE comece com SELECT
2. SEMPRE use aspas duplas para nomes de tabelas e campos
3. SEMPRE inclua o resource_id fornecido como FROM \"resource_id\"
4. SEMPRE especifique campos exatos
5. SEMPRE termine com LIMIT 100
6. SUA RESPOSTA DEVE SER APENAS A CONSULTA SQL, NADA MAIS";

fn from_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bFROM\s+").expect("valid regex"))
}

fn limit_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bLIMIT\b").expect("valid regex"))
}

fn trailing_clause() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s+(WHERE|GROUP\s+BY|HAVING|ORDER\s+BY|LIMIT)\b").expect("valid regex")
    })
}

/// `SELECT * FROM "<id>" LIMIT 100`, used when no fields are known.
pub fn star_fallback(resource_id: &str) -> String {
    format!("SELECT * FROM \"{}\" LIMIT {}", resource_id, ROW_LIMIT)
}

/// A query selecting up to [`FALLBACK_FIELDS`] fields explicitly.
pub fn field_fallback(resource_id: &str, field_names: &[&str]) -> String {
    if field_names.is_empty() {
        return star_fallback(resource_id);
    }
    let fields = field_names
        .iter()
        .take(FALLBACK_FIELDS)
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM \"{}\" LIMIT {}",
        fields, resource_id, ROW_LIMIT
    )
}

/// Generate the SQL statement for `question`.
///
/// Never fails. Without fields the deterministic star query is returned
/// without calling the model; a model failure yields [`field_fallback`].
pub async fn synthesize(
    model: &dyn LanguageModel,
    question: &str,
    resource_id: &str,
    metadata: &ResourceMetadata,
) -> String {
    if metadata.is_degraded() {
        warn!(resource_id, "no fields known, using fallback query");
        return star_fallback(resource_id);
    }

    let field_names = metadata.field_names();
    let request = CompletionRequest::new(
        ModelTier::Reasoning,
        SQL_PROMPT,
        format!(
            "Pergunta: {}\nResource ID: {}\nCampos disponíveis: {}\nExemplos de dados: {}\n\nGere APENAS a consulta SQL:",
            question,
            resource_id,
            serde_json::to_string(&field_names).unwrap_or_default(),
            serde_json::to_string(&metadata.examples).unwrap_or_default(),
        ),
        0.0,
    );

    match model.complete(&request).await {
        Ok(reply) => {
            let candidate = extract_sql(&reply);
            debug!(sql = %candidate, "generated SQL");
            sanitize_sql(&candidate, resource_id, &field_names)
        }
        Err(e) => {
            warn!(error = %e, "SQL generation failed, using field fallback");
            field_fallback(resource_id, &field_names)
        }
    }
}

/// Pull the statement out of a model reply: drop reasoning blocks and
/// markdown fences, trim, and remove trailing semicolons.
pub fn extract_sql(reply: &str) -> String {
    let text = strip_reasoning(reply);
    let body = match text.find("```") {
        Some(open) => {
            let after = &text[open + 3..];
            // Skip the info string (`sql`) on the fence line.
            let after = after.split_once('\n').map(|(_, rest)| rest).unwrap_or(after);
            match after.find("```") {
                Some(close) => &after[..close],
                None => after,
            }
        }
        None => text.as_str(),
    };
    body.trim().trim_end_matches(';').trim().to_string()
}

/// Repair a generated statement so it selects from `resource_id` with a
/// row limit. See the module docs for the exact rules.
pub fn sanitize_sql(sql: &str, resource_id: &str, field_names: &[&str]) -> String {
    let mut sql = sql.trim().to_string();

    if !sql.to_uppercase().starts_with("SELECT") {
        warn!(resource_id, "generated SQL does not start with SELECT, using field fallback");
        sql = field_fallback(resource_id, field_names);
    }

    if required_from_end(&sql, resource_id).is_none() {
        warn!(resource_id, "generated SQL lacks the resource FROM clause, injecting it");
        sql = inject_from(&sql, resource_id);
    }

    if !limit_keyword().is_match(&sql) {
        warn!("generated SQL lacks LIMIT, appending LIMIT {}", ROW_LIMIT);
        sql.push_str(&format!(" LIMIT {}", ROW_LIMIT));
    }

    collapse_duplicate_reference(&sql, resource_id)
}

/// Byte offset just past the first `FROM "<resource_id>"`, if any.
fn required_from_end(sql: &str, resource_id: &str) -> Option<usize> {
    let quoted = format!("\"{}\"", resource_id);
    from_keyword()
        .find_iter(sql)
        .find(|m| sql[m.end()..].starts_with(&quoted))
        .map(|m| m.end() + quoted.len())
}

fn inject_from(sql: &str, resource_id: &str) -> String {
    let clause = format!("FROM \"{}\"", resource_id);
    if let Some(m) = from_keyword().find(sql) {
        return format!("{}{} {}", &sql[..m.start()], clause, &sql[m.end()..]);
    }
    match trailing_clause().find(sql) {
        Some(m) => format!("{} {}{}", &sql[..m.start()], clause, &sql[m.start()..]),
        None => format!("{} {}", sql, clause),
    }
}

/// Remove a table reference that directly repeats the injected one.
fn collapse_duplicate_reference(sql: &str, resource_id: &str) -> String {
    let Some(end) = required_from_end(sql, resource_id) else {
        return sql.to_string();
    };
    let rest = &sql[end..];
    let trimmed = rest.trim_start();
    let gap = rest.len() - trimmed.len();
    if gap == 0 {
        return sql.to_string();
    }

    let quoted_id = format!("\"{}\"", resource_id);
    let quoted_placeholder = format!("\"{}\"", RESOURCE_PLACEHOLDER);
    let duplicates = [
        quoted_id.as_str(),
        quoted_placeholder.as_str(),
        resource_id,
        RESOURCE_PLACEHOLDER,
    ];

    for dup in duplicates {
        if let Some(after) = trimmed.strip_prefix(dup) {
            let boundary = after
                .chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '-'));
            if boundary {
                warn!(resource_id, "collapsing duplicated resource reference");
                return format!("{}{}", &sql[..end], after);
            }
        }
    }
    sql.to_string()
}
