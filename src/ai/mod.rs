pub mod client;
pub mod inference;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Decision, PostContent, Settings};

pub use client::OpenAiClassifier;

/// Decides whether a post is kept under the user's filter condition.
///
/// Implementations never fail: anything that goes wrong resolves to
/// [`Decision::Keep`].
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    async fn classify(&self, post: &PostContent, settings: &Settings) -> Decision;
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint answered {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(String),
}
