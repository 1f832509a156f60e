// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tip moderation pipeline.
//!
//! Three ordered stages, each able to short-circuit:
//!
//! 1. Structural validation ([`validator`])
//! 2. Policy classification ([`classifier`]), optional and fail-open
//! 3. PII redaction ([`redactor`])
//!
//! Every tip that passes validation ends in exactly one of `approved`,
//! `redacted` or `rejected`.

pub mod classifier;
pub mod redactor;
pub mod validator;

pub use classifier::{CategoryScore, Classification, Classifier, ClassifierError};
pub use redactor::{PiiCategory, Redaction, Redactor};
pub use validator::{TipValidator, ValidationError, ValidationResult};

use crate::config::{ClassifierConfig, ModerationConfig};
use crate::models::TipStatus;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_KEYWORDS: usize = 10;
const MIN_KEYWORD_CHARS: usize = 4;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "this", "that", "these", "those",
];

/// Result of moderating one tip.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationOutcome {
    pub status: TipStatus,
    /// Publishable text. Always empty for rejected tips.
    pub moderated_content: String,
    pub reason: Option<String>,
    /// Policy categories that caused a rejection.
    pub flagged: Vec<String>,
    /// PII categories that were redacted.
    pub redacted: Vec<PiiCategory>,
    pub keywords: Vec<String>,
    /// The classifier was configured but could not be consulted.
    pub degraded: bool,
}

pub struct ModerationPipeline {
    validator: TipValidator,
    classifier: Option<Arc<dyn Classifier>>,
    classifier_config: ClassifierConfig,
    redactor: Redactor,
}

impl ModerationPipeline {
    pub fn new(
        config: &ModerationConfig,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            validator: TipValidator::new(config),
            classifier,
            classifier_config: config.classifier.clone(),
            redactor: Redactor::new()?,
        })
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Moderate `content`. Only structural problems are errors; a policy
    /// rejection is a normal outcome.
    pub async fn moderate(&self, content: &str) -> Result<ModerationOutcome, ValidationError> {
        self.validator.validate(content).into_result()?;

        let mut degraded = false;
        if let Some(classifier) = &self.classifier {
            match tokio::time::timeout(
                self.classifier_config.timeout(),
                classifier.classify(content),
            )
            .await
            {
                Ok(Ok(classification)) => {
                    let flagged = self.flagged_categories(&classification);
                    if !flagged.is_empty() {
                        debug!(categories = ?flagged, "Tip rejected by classifier");
                        return Ok(ModerationOutcome {
                            status: TipStatus::Rejected,
                            moderated_content: String::new(),
                            reason: Some(format!("Content flagged for: {}", flagged.join(", "))),
                            flagged,
                            redacted: Vec::new(),
                            keywords: Vec::new(),
                            degraded: false,
                        });
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Classifier unavailable, falling back to redaction only");
                    degraded = true;
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.classifier_config.timeout_ms,
                        "Classifier timed out, falling back to redaction only"
                    );
                    degraded = true;
                }
            }
        }

        let redaction = self.redactor.redact(content);
        let keywords = extract_keywords(&Redactor::strip_tokens(&redaction.text));

        let (status, reason) = if redaction.was_redacted() {
            let labels: Vec<&str> = redaction.categories.iter().map(|c| c.label()).collect();
            (
                TipStatus::Redacted,
                Some(format!("Sensitive information redacted: {}", labels.join(", "))),
            )
        } else {
            (TipStatus::Approved, None)
        };

        debug!(status = %status, redacted = ?redaction.categories, degraded, "Tip moderated");
        Ok(ModerationOutcome {
            status,
            moderated_content: redaction.text,
            reason,
            flagged: Vec::new(),
            redacted: redaction.categories,
            keywords,
            degraded,
        })
    }

    /// Categories at or above their threshold. A category without a score
    /// counts when the classifier itself flagged it.
    fn flagged_categories(&self, classification: &Classification) -> Vec<String> {
        classification
            .categories
            .iter()
            .filter(|category| match category.score {
                Some(score) => score >= self.classifier_config.threshold_for(&category.label),
                None => category.flagged,
            })
            .map(|category| category.label.clone())
            .collect()
    }
}

/// Lowercase words longer than three characters, minus stopwords, in
/// first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !STOPWORDS.contains(word))
        .filter(|word| seen.insert(word.to_string()))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
