// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pattern-based PII redaction.
//!
//! Patterns run in a fixed order and every match is replaced with a
//! bracketed, category-specific token. Tokens contain no digits, `@` or
//! scheme separators, so redacting already-redacted text changes nothing.
//! A match that swallows tokens from earlier patterns keeps them after its
//! own token.

use regex::{Captures, Regex};
use std::fmt;

/// Kind of personal information a pattern detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiCategory {
    Url,
    Email,
    IpAddress,
    CreditCard,
    Ssn,
    Phone,
    Address,
}

impl PiiCategory {
    pub const ALL: [PiiCategory; 7] = [
        PiiCategory::Url,
        PiiCategory::Email,
        PiiCategory::IpAddress,
        PiiCategory::CreditCard,
        PiiCategory::Ssn,
        PiiCategory::Phone,
        PiiCategory::Address,
    ];

    /// Replacement token written into the text.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Url => "[URL_REDACTED]",
            Self::Email => "[EMAIL_REDACTED]",
            Self::IpAddress => "[IP_REDACTED]",
            Self::CreditCard => "[CARD_REDACTED]",
            Self::Ssn => "[SSN_REDACTED]",
            Self::Phone => "[PHONE_REDACTED]",
            Self::Address => "[ADDRESS_REDACTED]",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Email => "email",
            Self::IpAddress => "ip_address",
            Self::CreditCard => "credit_card",
            Self::Ssn => "ssn",
            Self::Phone => "phone",
            Self::Address => "address",
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered pattern table. Earlier entries win on overlapping text: emails
/// before links (a `www.` host inside an address), cards and SSNs before
/// phone numbers.
const PATTERNS: &[(PiiCategory, &str)] = &[
    (PiiCategory::Email, r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"),
    (PiiCategory::Url, r#"(?i)\b(?:https?://|ftp://|www\.)[^\s<>"']+"#),
    (PiiCategory::IpAddress, r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
    (PiiCategory::IpAddress, r"\b(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}\b"),
    (PiiCategory::CreditCard, r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{3,4}\b"),
    (PiiCategory::Ssn, r"\b\d{3}-\d{2}-\d{4}\b"),
    (PiiCategory::Phone, r"\+\d{1,3}[ -]?\d(?:[ -]?\d){6,13}\b"),
    (PiiCategory::Phone, r"\(\d{3}\)\s*\d{3}[-. ]?\d{4}\b"),
    (PiiCategory::Phone, r"\b\d{3}[-. ]?\d{3}[-. ]?\d{4}\b"),
    (
        PiiCategory::Address,
        r"\b\d{1,6}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl)\b\.?",
    ),
    (PiiCategory::Address, r"(?i)\bP\.?\s*O\.?\s*Box\s+\d+\b"),
];

/// Result of a redaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub text: String,
    /// Categories that matched, in pattern order, without duplicates.
    pub categories: Vec<PiiCategory>,
}

impl Redaction {
    pub fn was_redacted(&self) -> bool {
        !self.categories.is_empty()
    }
}

/// Compiled PII patterns.
#[derive(Debug, Clone)]
pub struct Redactor {
    patterns: Vec<(PiiCategory, Regex)>,
}

impl Redactor {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = PATTERNS
            .iter()
            .map(|(category, pattern)| Ok((*category, Regex::new(pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    /// Replace every match with its category token.
    pub fn redact(&self, content: &str) -> Redaction {
        let mut text = content.to_string();
        let mut categories = Vec::new();

        for (category, pattern) in &self.patterns {
            if !pattern.is_match(&text) {
                continue;
            }
            text = pattern
                .replace_all(&text, |caps: &Captures| replacement(*category, &caps[0]))
                .into_owned();
            if !categories.contains(category) {
                categories.push(*category);
            }
        }

        Redaction { text, categories }
    }

    /// Text with redaction tokens blanked out, for keyword extraction.
    pub fn strip_tokens(text: &str) -> String {
        PiiCategory::ALL
            .iter()
            .fold(text.to_string(), |acc, category| acc.replace(category.token(), " "))
    }
}

/// Token for `matched`, followed by any earlier tokens it contained.
fn replacement(category: PiiCategory, matched: &str) -> String {
    PiiCategory::ALL
        .iter()
        .filter(|other| **other != category && matched.contains(other.token()))
        .fold(category.token().to_string(), |mut acc, other| {
            acc.push(' ');
            acc.push_str(other.token());
            acc
        })
}
