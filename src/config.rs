//! TOML configuration parsing.
//!
//! All settings live in a single file (default `./config/recife.toml`).
//! Every section except `[catalog]` and `[llm]` may be omitted and falls
//! back to the defaults below.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [catalog]
//! api_url = "https://dados.recife.pe.gov.br/api/3/action"
//!
//! [llm]
//! model = "deepseek-r1-distill-llama-70b"
//! chat_model = "llama3-8b-8192"
//! ```
//!
//! The language-model API key is never stored in the file. It is read from
//! the environment variable named by `llm.api_key_env` when the client is
//! built.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// CKAN action API settings.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Base URL of the action API, e.g. `https://host/api/3/action`.
    pub api_url: String,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_timeout() -> u64 {
    30
}

/// OpenAI-compatible chat completion settings (Groq by default).
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model used by the pipeline stages (selection, SQL, narration).
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used by the classifier, personas and the conversation handler.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_model() -> String {
    "deepseek-r1-distill-llama-70b".to_string()
}
fn default_chat_model() -> String {
    "llama3-8b-8192".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Deadline for one full pipeline attempt made on behalf of a chat message.
    #[serde(default = "default_pipeline_timeout")]
    pub pipeline_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pipeline_timeout_secs: default_pipeline_timeout(),
        }
    }
}

fn default_pipeline_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Conversations kept at once; the least recently active one is evicted.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_turns: default_max_turns(),
            max_conversations: default_max_conversations(),
        }
    }
}

fn default_max_turns() -> usize {
    5
}

fn default_max_conversations() -> usize {
    1000
}

/// Optional log file, written in addition to stderr.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Appended to, never rotated.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Config {
    /// A configuration with every default applied and the public Recife
    /// catalog as the data source.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog: CatalogConfig {
                api_url: "https://dados.recife.pe.gov.br/api/3/action".to_string(),
                timeout_secs: default_catalog_timeout(),
            },
            llm: LlmConfig {
                base_url: default_llm_base_url(),
                model: default_model(),
                chat_model: default_chat_model(),
                api_key_env: default_api_key_env(),
                timeout_secs: default_llm_timeout(),
            },
            router: RouterConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.catalog.api_url.trim().is_empty() {
            anyhow::bail!("catalog.api_url must not be empty");
        }
        if self.catalog.timeout_secs == 0 {
            anyhow::bail!("catalog.timeout_secs must be > 0");
        }
        if self.llm.base_url.trim().is_empty() {
            anyhow::bail!("llm.base_url must not be empty");
        }
        if self.llm.model.trim().is_empty() || self.llm.chat_model.trim().is_empty() {
            anyhow::bail!("llm.model and llm.chat_model must not be empty");
        }
        if self.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be > 0");
        }
        if self.router.pipeline_timeout_secs == 0 {
            anyhow::bail!("router.pipeline_timeout_secs must be > 0");
        }
        if self.history.enabled && self.history.max_turns == 0 {
            anyhow::bail!("history.max_turns must be > 0 when history is enabled");
        }
        if self.history.enabled && self.history.max_conversations == 0 {
            anyhow::bail!("history.max_conversations must be > 0 when history is enabled");
        }
        Ok(())
    }
}

/// Parse and validate a configuration string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
[catalog]
api_url = "http://localhost:5000/api/3/action"

[llm]
"#;

    #[test]
    fn test_defaults_applied() {
        let cfg = parse_config(BASIC).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.catalog.timeout_secs, 30);
        assert_eq!(cfg.llm.model, "deepseek-r1-distill-llama-70b");
        assert_eq!(cfg.llm.chat_model, "llama3-8b-8192");
        assert_eq!(cfg.llm.api_key_env, "GROQ_API_KEY");
        assert!(!cfg.history.enabled);
        assert_eq!(cfg.history.max_turns, 5);
        assert_eq!(cfg.router.pipeline_timeout_secs, 120);
    }

    #[test]
    fn test_empty_api_url_rejected() {
        let err = parse_config("[catalog]\napi_url = \"  \"\n[llm]\n").unwrap_err();
        assert!(err.to_string().contains("catalog.api_url"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let content = format!("{}timeout_secs = 0\n", BASIC);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("llm.timeout_secs"));
    }

    #[test]
    fn test_history_requires_turns() {
        let content = format!("{}\n[history]\nenabled = true\nmax_turns = 0\n", BASIC);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_missing_catalog_section() {
        assert!(parse_config("[llm]\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recife.toml");
        std::fs::write(&path, BASIC).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.catalog.api_url, "http://localhost:5000/api/3/action");

        let missing = load_config(&dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_history_and_logging_sections() {
        let content = format!(
            "{}\n[history]\nenabled = true\nmax_conversations = 20\n\n[logging]\nfile = \"logs/recife.log\"\n",
            BASIC
        );
        let cfg = parse_config(&content).unwrap();
        assert_eq!(cfg.history.max_conversations, 20);
        assert_eq!(cfg.logging.file, Some(PathBuf::from("logs/recife.log")));

        let defaults = parse_config(BASIC).unwrap();
        assert_eq!(defaults.history.max_conversations, 1000);
        assert!(defaults.logging.file.is_none());
    }

    #[test]
    fn test_minimal_is_valid() {
        Config::minimal().validate().unwrap();
    }
}
