// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission orchestration.
//!
//! A submission moves through: resolve identity, ban check, rate check,
//! moderation, persistence, quota commit. Only a stored tip consumes quota;
//! every earlier exit drops the reservation and releases its slot.

use crate::bans::BanManager;
use crate::config::{Config, FeedConfig};
use crate::error::SubmitError;
use crate::identity::{IdentityError, IdentityManager, ResolvedSubmitter, SubmitterMetadata, SubmitterToken};
use crate::limiter::{QuotaExceeded, QuotaStatus, RateLimitResult, RateLimiter};
use crate::metrics::Metrics;
use crate::models::{next_tip_id, BanDuration, BanRecord, Tip, TipStatus};
use crate::moderation::{Classifier, ModerationPipeline};
use crate::store::{BanStore, StoreError, TipStore};
use chrono::Utc;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One incoming tip.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub content: String,
    /// Encoded token presented by the client, if any.
    pub token: Option<String>,
    pub source_address: String,
    pub user_agent: String,
}

/// Terminal outcome of a submission.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Stored as `approved` or `redacted`.
    Accepted(Tip),
    /// Refused by policy. Nothing stored, no quota used.
    Rejected { reason: String },
    RateLimited(QuotaExceeded),
    Banned(BanRecord),
}

impl SubmissionOutcome {
    /// Outcome label used in metrics and response bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted(tip) if tip.status == TipStatus::Redacted => "redacted",
            Self::Accepted(_) => "success",
            Self::Rejected { .. } => "rejected",
            Self::RateLimited(_) => "rate_limited",
            Self::Banned(_) => "banned",
        }
    }
}

/// A processed submission together with the identity it was made under.
#[derive(Debug)]
pub struct Submission {
    pub submitter: ResolvedSubmitter,
    pub result: Result<SubmissionOutcome, SubmitError>,
}

impl Submission {
    pub fn label(&self) -> &'static str {
        match &self.result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.label(),
        }
    }
}

pub struct TipService {
    identity: IdentityManager,
    bans: BanManager,
    limiter: RateLimiter,
    moderation: ModerationPipeline,
    tips: Arc<dyn TipStore>,
    metrics: Arc<Metrics>,
    pending: Mutex<VecDeque<String>>,
    pending_capacity: usize,
    store_timeout: Duration,
    feed: FeedConfig,
}

impl TipService {
    pub fn new(
        config: &Config,
        identity: IdentityManager,
        tips: Arc<dyn TipStore>,
        bans: Arc<dyn BanStore>,
        classifier: Option<Arc<dyn Classifier>>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            identity,
            bans: BanManager::new(bans),
            limiter: RateLimiter::new(&config.rate_limit),
            moderation: ModerationPipeline::new(&config.moderation, classifier)?,
            tips,
            metrics,
            pending: Mutex::new(VecDeque::new()),
            pending_capacity: config.store.pending_capacity.max(1),
            store_timeout: config.store.timeout(),
            feed: config.feed.clone(),
        })
    }

    pub fn has_classifier(&self) -> bool {
        self.moderation.has_classifier()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one submission to a terminal state.
    ///
    /// Fails only when no identity can be established; every later failure
    /// is reported in [`Submission::result`] so the caller can still hand a
    /// freshly minted token back to the client.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<Submission, IdentityError> {
        let submitter = self.identity.resolve(
            request.token.as_deref(),
            &request.source_address,
            &request.user_agent,
        )?;

        let result = self.process(&submitter.token, &request).await;
        let submission = Submission { submitter, result };
        self.metrics.record_outcome(submission.label());
        Ok(submission)
    }

    async fn process(
        &self,
        token: &SubmitterToken,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let anon_id = token.anon_id();

        if let Some(ban) = self.with_timeout(self.bans.active_ban(anon_id)).await? {
            info!(anon_id = %anon_id, expires_at = ?ban.expires_at, "Submission from banned submitter");
            return Ok(SubmissionOutcome::Banned(ban));
        }

        let reservation = match self.limiter.check_and_reserve(anon_id) {
            RateLimitResult::Allowed(reservation) => reservation,
            RateLimitResult::Limited(exceeded) => {
                info!(anon_id = %anon_id, reset_at = %exceeded.reset_at, "Submission rate limited");
                return Ok(SubmissionOutcome::RateLimited(exceeded));
            }
        };

        let outcome = self.moderation.moderate(&request.content).await?;
        if outcome.degraded {
            self.metrics.record_degraded();
        }

        if outcome.status == TipStatus::Rejected {
            info!(anon_id = %anon_id, categories = ?outcome.flagged, "Tip rejected");
            let reason = outcome
                .reason
                .unwrap_or_else(|| "Content flagged".to_string());
            return Ok(SubmissionOutcome::Rejected { reason });
        }

        let now = Utc::now();
        let tip = Tip {
            id: next_tip_id(now),
            raw_content: request.content.clone(),
            moderated_content: outcome.moderated_content,
            anon_id: anon_id.to_string(),
            encrypted_metadata: token.encrypted_metadata(),
            status: outcome.status,
            reason: outcome.reason,
            keywords: outcome.keywords,
            timestamp: now,
            source_address: request.source_address.clone(),
        };

        if let Err(e) = self.with_timeout(self.tips.put_tip(tip.clone())).await {
            self.metrics.record_store_failure();
            warn!(anon_id = %anon_id, error = %e, "Failed to store tip");
            return Err(SubmitError::Persistence(e));
        }

        let quota = reservation.commit();
        self.metrics.record_redactions(&outcome.redacted);
        self.enqueue_pending(&tip.id).await;

        info!(
            tip_id = %tip.id,
            anon_id = %anon_id,
            status = %tip.status,
            remaining = quota.remaining,
            "Tip accepted"
        );
        Ok(SubmissionOutcome::Accepted(tip))
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    async fn enqueue_pending(&self, tip_id: &str) {
        let mut pending = self.pending.lock().await;
        if pending.len() >= self.pending_capacity {
            if let Some(dropped) = pending.pop_front() {
                warn!(tip_id = %dropped, "Pending queue full, dropping oldest tip");
            }
        }
        pending.push_back(tip_id.to_string());
    }

    /// Claim up to `limit` accepted tip IDs, oldest first, for attachment to
    /// location logs. Claimed IDs are removed from the queue.
    pub async fn claim_pending(&self, limit: Option<usize>) -> Vec<String> {
        let limit = limit
            .filter(|&n| n > 0)
            .unwrap_or(self.feed.attach_batch)
            .min(self.pending_capacity);
        let mut pending = self.pending.lock().await;
        let take = limit.min(pending.len());
        let claimed: Vec<String> = pending.drain(..take).collect();
        debug!(claimed = claimed.len(), left = pending.len(), "Claimed pending tips");
        claimed
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Quota snapshot for response headers.
    pub fn quota(&self, anon_id: &str) -> QuotaStatus {
        self.limiter.status(anon_id)
    }

    /// Newest approved and redacted tips.
    pub async fn recent_public(&self, limit: Option<usize>) -> Result<Vec<Tip>, StoreError> {
        let limit = limit
            .filter(|&n| n > 0)
            .unwrap_or(self.feed.default_limit)
            .min(self.feed.max_limit);
        self.with_timeout(self.tips.recent_by_status(&TipStatus::PUBLIC, limit))
            .await
    }

    pub async fn get_tip(&self, id: &str) -> Result<Option<Tip>, StoreError> {
        self.with_timeout(self.tips.get_tip(id)).await
    }

    pub async fn submitter_tips(
        &self,
        anon_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Tip>, StoreError> {
        let limit = limit
            .filter(|&n| n > 0)
            .unwrap_or(self.feed.default_limit)
            .min(self.feed.max_limit);
        self.with_timeout(self.tips.by_submitter(anon_id, limit)).await
    }

    pub async fn ban(
        &self,
        anon_id: &str,
        duration: BanDuration,
        reason: &str,
        actor: &str,
    ) -> Result<BanRecord, StoreError> {
        self.with_timeout(self.bans.ban(anon_id, duration, reason, actor))
            .await
    }

    pub async fn unban(&self, anon_id: &str) -> Result<bool, StoreError> {
        self.with_timeout(self.bans.unban(anon_id)).await
    }

    pub async fn active_ban(&self, anon_id: &str) -> Result<Option<BanRecord>, StoreError> {
        self.with_timeout(self.bans.active_ban(anon_id)).await
    }

    pub async fn list_bans(&self) -> Result<Vec<BanRecord>, StoreError> {
        self.with_timeout(self.bans.list_active()).await
    }

    /// Open a submitter token. Administrative use only.
    pub fn reverse_token(&self, encoded: &str) -> Result<(String, SubmitterMetadata), IdentityError> {
        let token = SubmitterToken::decode(encoded)?;
        let metadata = self.identity.reverse(token.ciphertext())?;
        info!(anon_id = %token.anon_id(), "Submitter token reversed");
        Ok((token.anon_id().to_string(), metadata))
    }

    /// Drop idle rate windows and refresh the window gauge.
    pub fn sweep(&self) -> usize {
        let removed = self.limiter.cleanup();
        self.metrics.set_active_windows(self.limiter.tracked());
        removed
    }
}
