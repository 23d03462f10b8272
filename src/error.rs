//! Error types for the catalog client, the language-model client and the
//! query pipeline.
//!
//! Only [`PipelineError`] ever reaches a caller of the pipeline. Catalog and
//! model failures are absorbed by the stage that observed them and replaced
//! with a local fallback, except where a stage has no sensible substitute
//! (dataset selection), in which case they are folded into a
//! [`PipelineError`].

use thiserror::Error;

/// Failures talking to the CKAN action API.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("catalog action failed: {0}")]
    Api(String),

    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

/// Failures invoking the language model.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no content")]
    EmptyReply,

    #[error("model call failed: {0}")]
    Other(String),
}

/// Failures the query pipeline surfaces to its direct caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no datasets available in the catalog")]
    CatalogUnavailable,

    #[error("dataset selection failed: {0}")]
    MalformedSelection(String),

    #[error("could not resolve resources for dataset '{0}'")]
    DatasetUnresolvable(String),

    #[error("pipeline timed out after {0}s")]
    Timeout(u64),
}
