//! Forwards a stored resume and a job description to the
//! external ATS scoring service.
//!
//! The service owns the scoring algorithm and its result shape; its JSON is
//! stored and returned untouched.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::errors::AppError;

pub struct ScoringInput<'a> {
    pub bytes: Bytes,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub job_description: &'a str,
}

/// Carried in `AppState` as `Arc<dyn ResumeScorer>`.
#[async_trait]
pub trait ResumeScorer: Send + Sync {
    async fn analyze(&self, input: ScoringInput<'_>) -> Result<Value, AppError>;
}

#[derive(Clone)]
pub struct HttpResumeScorer {
    client: Client,
    url: String,
}

impl HttpResumeScorer {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.scoring_url.clone(), config.outbound_timeout)
    }
}

#[async_trait]
impl ResumeScorer for HttpResumeScorer {
    async fn analyze(&self, input: ScoringInput<'_>) -> Result<Value, AppError> {
        let part = Part::bytes(input.bytes.to_vec())
            .file_name(input.file_name.to_string())
            .mime_str(input.content_type)
            .map_err(|e| AppError::Scoring(format!("invalid content type: {e}")))?;
        let form = Form::new()
            .part("resume", part)
            .text("job_desc", input.job_description.to_string());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout("the scoring service")
                } else {
                    AppError::Scoring(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Scoring(format!("service returned {status}: {body}")));
        }

        let analysis: Value = response
            .json()
            .await
            .map_err(|e| AppError::Scoring(format!("unreadable analysis: {e}")))?;
        debug!("Scoring service returned analysis for {}", input.file_name);
        Ok(analysis)
    }
}
