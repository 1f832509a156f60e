// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Structural checks on tip content.
//!
//! - Empty or whitespace-only content
//! - Length limit, counted in characters
//! - Link flooding
//! - Single-word repetition

use crate::config::ModerationConfig;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Word count above which repetition is checked.
const REPETITION_MIN_WORDS: usize = 5;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Tip content cannot be empty")]
    Empty,

    #[error("Tip content too long: {actual} characters (max {max})")]
    TooLong { max: usize, actual: usize },

    #[error("Content contains too many URLs: {found} (max {max})")]
    TooManyLinks { max: usize, found: usize },

    #[error("Content contains excessive repetition")]
    ExcessiveRepetition,
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(e) => Err(e),
        }
    }
}

pub struct TipValidator {
    max_length: usize,
    max_links: usize,
    block_repetition: bool,
}

impl TipValidator {
    pub fn new(config: &ModerationConfig) -> Self {
        Self {
            max_length: config.max_length,
            max_links: config.max_links,
            block_repetition: config.block_repetition,
        }
    }

    pub fn validate_length(&self, content: &str) -> ValidationResult {
        if content.trim().is_empty() {
            debug!("Empty tip content");
            return ValidationResult::Invalid(ValidationError::Empty);
        }

        let actual = content.chars().count();
        if actual > self.max_length {
            debug!(length = actual, max = self.max_length, "Tip content too long");
            return ValidationResult::Invalid(ValidationError::TooLong {
                max: self.max_length,
                actual,
            });
        }

        ValidationResult::Valid
    }

    /// Counts `http` occurrences, so `https://` and bare `http` mentions
    /// both count.
    pub fn validate_links(&self, content: &str) -> ValidationResult {
        let found = content.to_lowercase().matches("http").count();
        if found > self.max_links {
            debug!(links = found, max = self.max_links, "Too many links");
            return ValidationResult::Invalid(ValidationError::TooManyLinks {
                max: self.max_links,
                found,
            });
        }
        ValidationResult::Valid
    }

    /// Reject content where one word is more than half of all words.
    pub fn validate_repetition(&self, content: &str) -> ValidationResult {
        if !self.block_repetition {
            return ValidationResult::Valid;
        }

        let words: Vec<String> = content
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if words.len() <= REPETITION_MIN_WORDS {
            return ValidationResult::Valid;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *counts.entry(word.as_str()).or_default() += 1;
        }

        let half = words.len() / 2;
        if counts.values().any(|&count| count > half) {
            debug!(words = words.len(), "Excessive repetition");
            return ValidationResult::Invalid(ValidationError::ExcessiveRepetition);
        }
        ValidationResult::Valid
    }

    /// Run every check, stopping at the first failure.
    pub fn validate(&self, content: &str) -> ValidationResult {
        for result in [
            self.validate_length(content),
            self.validate_links(content),
            self.validate_repetition(content),
        ] {
            if !result.is_valid() {
                return result;
            }
        }
        ValidationResult::Valid
    }
}
