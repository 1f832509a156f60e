// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Anonymous tip intake
//!
//! Accepts free-text tips from pseudonymous submitters and decides what may
//! be published:
//!
//! - Encrypted client-held submitter tokens with a stable anonymous ID
//! - Sliding-window rate limiting per anonymous ID (10 per hour default)
//! - Temporary and permanent submission bans
//! - Moderation: structural checks, policy classifier, PII redaction
//! - A moderated public feed and a pending-tip queue for log attachment

pub mod bans;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod moderation;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{ApiError, SubmitError};
pub use identity::IdentityManager;
pub use limiter::{RateLimitResult, RateLimiter};
pub use models::{BanDuration, BanRecord, Tip, TipStatus};
pub use service::{Submission, SubmissionOutcome, SubmissionRequest, TipService};
pub use store::MemoryStore;
