// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Content policy classification.
//!
//! Wraps an OpenAI-compatible `/v1/moderations` endpoint behind the
//! [`Classifier`] trait.

use crate::config::{ClassifierConfig, Secret};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Classifier error types.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {0}")]
    Status(u16),

    #[error("classifier timed out")]
    Timeout,

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// One policy category as reported by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub label: String,
    pub score: Option<f32>,
    pub flagged: bool,
}

impl CategoryScore {
    pub fn new(label: impl Into<String>, score: Option<f32>, flagged: bool) -> Self {
        Self {
            label: label.into(),
            score,
            flagged,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub categories: Vec<CategoryScore>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, content: &str) -> Result<Classification, ClassifierError>;
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    #[serde(default)]
    categories: BTreeMap<String, bool>,
    #[serde(default)]
    category_scores: BTreeMap<String, f32>,
}

impl ModerationResult {
    fn into_classification(self) -> Classification {
        let mut labels: Vec<&String> = self
            .categories
            .keys()
            .chain(self.category_scores.keys())
            .collect();
        labels.sort();
        labels.dedup();

        let categories = labels
            .into_iter()
            .map(|label| {
                CategoryScore::new(
                    label.clone(),
                    self.category_scores.get(label).copied(),
                    self.categories.get(label).copied().unwrap_or(false),
                )
            })
            .collect();
        Classification { categories }
    }
}

/// Client for an OpenAI-compatible moderation endpoint.
pub struct OpenAiModerationClient {
    endpoint: String,
    api_key: Secret,
    model: Option<String>,
    client: reqwest::Client,
}

impl OpenAiModerationClient {
    /// Build a client from config. Returns `None` when no API key is set.
    pub fn from_config(config: &ClassifierConfig) -> Result<Option<Self>, ClassifierError> {
        let (Some(endpoint), Some(api_key)) = (&config.endpoint, &config.api_key) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Some(Self {
            endpoint: endpoint.clone(),
            api_key: api_key.clone(),
            model: config.model.clone(),
            client,
        }))
    }
}

#[async_trait]
impl Classifier for OpenAiModerationClient {
    async fn classify(&self, content: &str) -> Result<Classification, ClassifierError> {
        let mut body = serde_json::json!({ "input": content });
        if let Some(model) = &self.model {
            body["model"] = serde_json::Value::String(model.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let parsed: ModerationResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        parsed
            .results
            .into_iter()
            .next()
            .map(ModerationResult::into_classification)
            .ok_or_else(|| ClassifierError::Malformed("empty results".to_string()))
    }
}
