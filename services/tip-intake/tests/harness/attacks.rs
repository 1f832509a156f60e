// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse simulation patterns for security testing.

/// What each simulated submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Clean,
    Pii,
    Spam,
    /// Triggers the scripted classifier.
    Hostile,
}

/// Abuse pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of submissions to send
    pub total_submissions: usize,
    /// Number of distinct submitters (each keeps its own token)
    pub submitters: usize,
    /// Mint a fresh token for every submission instead of reusing one
    pub rotate_tokens: bool,
    /// What the submissions contain
    pub payload: Payload,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_submissions: 50,
            submitters: 1,
            rotate_tokens: false,
            payload: Payload::Clean,
        }
    }
}

/// Predefined abuse patterns.
impl AttackConfig {
    /// One submitter floods the intake.
    pub fn single_submitter_flood() -> Self {
        Self {
            total_submissions: 50,
            ..Default::default()
        }
    }

    /// Many submitters, a few tips each.
    pub fn distributed_submitters() -> Self {
        Self {
            total_submissions: 100,
            submitters: 20,
            ..Default::default()
        }
    }

    /// Discards its token after every submission to dodge the quota.
    pub fn token_rotation() -> Self {
        Self {
            total_submissions: 30,
            rotate_tokens: true,
            ..Default::default()
        }
    }

    /// Link floods, repetition and oversized bodies.
    pub fn spam_flood() -> Self {
        Self {
            total_submissions: 60,
            payload: Payload::Spam,
            ..Default::default()
        }
    }

    /// Content the classifier rejects, from one submitter.
    pub fn hostile_flood() -> Self {
        Self {
            total_submissions: 30,
            payload: Payload::Hostile,
            ..Default::default()
        }
    }

    /// Doxxing attempts spread across submitters.
    pub fn pii_dump() -> Self {
        Self {
            total_submissions: 27,
            submitters: 9,
            payload: Payload::Pii,
            ..Default::default()
        }
    }

    /// Most submissions a well-behaved limiter can accept.
    pub fn max_accepted(&self, limit_per_submitter: usize) -> usize {
        match self.payload {
            Payload::Spam | Payload::Hostile => 0,
            _ if self.rotate_tokens => self.total_submissions,
            _ => {
                let per_submitter = self.total_submissions.div_ceil(self.submitters.max(1));
                self.submitters * per_submitter.min(limit_per_submitter)
            }
        }
    }
}
