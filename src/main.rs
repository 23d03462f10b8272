//! # Recife Data CLI (`recife`)
//!
//! The `recife` binary runs the HTTP server and exposes the question
//! pipeline and the chat router from the command line.
//!
//! ## Usage
//!
//! ```bash
//! recife --config ./config/recife.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recife serve` | Start the HTTP server |
//! | `recife ask "<question>"` | Run the pipeline once and print the result |
//! | `recife chat "<message>"` | Route one chat message |
//! | `recife datasets` | List catalog datasets |
//! | `recife personas` | List personas |
//! | `recife completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `recife_data=info,tower_http=info`). Setting `[logging].file`
//! also appends the same events, without colours, to that file.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recife_data::catalog::CkanClient;
use recife_data::config::{self, Config, LoggingConfig};
use recife_data::personas::list_personas;
use recife_data::server::{build_message_router, run_server};
use recife_data::traits::CatalogClient;

/// Recife Data: ask the city's open-data catalog questions in plain language.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/recife.example.toml` for a full example. Without a
/// config file the public Recife catalog and Groq defaults are used.
#[derive(Parser)]
#[command(
    name = "recife",
    about = "Natural-language question answering over the Recife open-data catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recife.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Run the data pipeline for one question.
    ///
    /// Prints the answer followed by the dataset, resource, SQL and up to
    /// ten result rows.
    Ask {
        /// The question, in Portuguese.
        question: String,

        /// Print the result as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Route one chat message as the `/message` endpoint would.
    Chat {
        message: String,

        /// Persona tag: CULTURA, SERVICOS, MOBILIDADE, SAUDE or GERAL.
        #[arg(long)]
        persona: Option<String>,

        /// Continue an existing conversation.
        #[arg(long)]
        conversation: Option<String>,
    },

    /// List dataset names in the catalog.
    Datasets,

    /// List personas and their display names.
    Personas,

    /// Generate shell completions.
    Completions {
        shell: Shell,
    },
}

/// A missing config file at the default location falls back to
/// [`Config::minimal`]; an explicit but unreadable or invalid one is an error.
fn resolve_config(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

/// Log to stderr, and also to `[logging].file` when one is configured.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let file_layer = match &logging.file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recife_data=info,tower_http=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "recife", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Personas => {
            for p in list_personas() {
                println!("{:<12} {}", p.tag, p.display_name);
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = resolve_config(&cli.config)?;
    init_tracing(&cfg.logging)?;

    match cli.command {
        Commands::Serve => {
            run_server(&cfg).await?;
        }
        Commands::Ask { question, json } => {
            let router = build_message_router(&cfg)?;
            let answer = router
                .pipeline()
                .answer_query(&question)
                .await
                .context("query failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}\n", answer.answer);
                println!("dataset:  {}", answer.dataset.as_deref().unwrap_or("-"));
                println!("resource: {}", answer.resource.as_deref().unwrap_or("-"));
                println!("sql:      {}", answer.sql_query.as_deref().unwrap_or("-"));
                for row in &answer.data {
                    println!("  {}", serde_json::Value::Object(row.clone()));
                }
            }
        }
        Commands::Chat {
            message,
            persona,
            conversation,
        } => {
            let router = build_message_router(&cfg)?;
            let answer = router
                .answer_message(&message, conversation.as_deref(), persona.as_deref())
                .await;
            println!("{}", answer.answer);
            eprintln!(
                "[{} | conversation {} | data query: {}]",
                answer.persona, answer.conversation_id, answer.used_pipeline
            );
        }
        Commands::Datasets => {
            let catalog = CkanClient::new(&cfg.catalog)?;
            let names = catalog.fetch_dataset_names().await?;
            if names.is_empty() {
                println!("No datasets found.");
            }
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Personas | Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
