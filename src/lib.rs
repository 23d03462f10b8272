//! # Recife Data
//!
//! Natural-language question answering over the Recife open-data catalog.
//!
//! A question in Portuguese is turned into a SQL query against one table of
//! the city's CKAN catalog, the query is executed, and the rows are narrated
//! back as prose. Chat messages that are not data questions are answered by
//! one of a small set of domain personas.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────┐
//!   message ────▶ │ MessageRouter │──── CHAT ────▶ ┌──────────┐
//!                 └──────┬────────┘                │ Personas │
//!                        │ QUERY                   └────┬─────┘
//!                        ▼                              │ failure
//!                 ┌───────────────┐   failure           ▼
//!   question ───▶ │ QueryPipeline │ ──────────▶ ConversationHandler
//!                 └──────┬────────┘
//!                        │
//!          ┌─────────────┴────────────┐
//!          ▼                          ▼
//!   ┌─────────────┐            ┌─────────────┐
//!   │ CkanClient  │            │ ChatClient  │
//!   │ (catalog)   │            │ (LLM)       │
//!   └─────────────┘            └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GROQ_API_KEY=...
//! recife datasets                          # list catalog datasets
//! recife ask "Quantas escolas municipais existem?"
//! recife chat "Oi!" --persona CULTURA
//! recife serve                             # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error types for the catalog, the model and the pipeline |
//! | [`models`] | Core data types |
//! | [`traits`] | `CatalogClient` and `LanguageModel` seams |
//! | [`catalog`] | CKAN action API client |
//! | [`llm`] | OpenAI-compatible chat completion client |
//! | [`selector`] | Dataset and resource selection |
//! | [`probe`] | Resource metadata sampling |
//! | [`sql`] | SQL synthesis and sanitization |
//! | [`narrate`] | Answer synthesis |
//! | [`pipeline`] | The end-to-end question pipeline |
//! | [`classify`] | QUERY/CHAT classification |
//! | [`personas`] | Domain personas and the conversation handler |
//! | [`history`] | Conversation history stores |
//! | [`router`] | Chat message routing |
//! | [`server`] | HTTP server |

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod narrate;
pub mod personas;
pub mod pipeline;
pub mod probe;
pub mod router;
pub mod selector;
pub mod server;
pub mod sql;
pub mod traits;
