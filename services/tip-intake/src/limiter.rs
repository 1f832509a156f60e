// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window rate limiter for tip submissions.
//!
//! Each anonymous ID owns the list of its submission timestamps within the
//! trailing window. A check prunes the list, compares it to the limit and,
//! when there is room, reserves a slot in the same critical section. The
//! slot only becomes a counted submission when the caller commits it;
//! dropping the [`Reservation`] gives the slot back, so rejected, failed or
//! cancelled submissions never consume quota.

use crate::config::RateLimitConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Longest supported window (366 days).
const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

/// Snapshot of a submitter's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub limit: u32,
    pub remaining: u32,
    /// When the oldest counted submission leaves the window.
    pub reset_at: DateTime<Utc>,
}

/// Why a reservation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaExceeded {
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl QuotaExceeded {
    /// Time left until a slot frees up, measured from `now`.
    pub fn retry_after(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_at - now).to_std().unwrap_or_default()
    }
}

impl std::fmt::Display for QuotaExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Too many submissions ({} per window). Try again after {}",
            self.limit,
            self.reset_at.to_rfc3339()
        )
    }
}

/// A reserved slot handle inside a quota store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub anon_id: String,
    pub id: u64,
    pub at: DateTime<Utc>,
}

/// Storage behind the rate limiter. The in-memory [`SlidingWindowLimiter`]
/// is the single-instance implementation; a shared counter can replace it
/// without touching callers.
pub trait QuotaStore: Send + Sync {
    fn limit(&self) -> u32;

    /// Prune, check and reserve atomically.
    fn check_and_reserve(
        &self,
        anon_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Slot, QuotaStatus), QuotaExceeded>;

    /// Turn a reserved slot into a counted submission.
    fn commit(&self, slot: &Slot);

    /// Give a reserved slot back.
    fn release(&self, slot: &Slot);

    fn status(&self, anon_id: &str, now: DateTime<Utc>) -> QuotaStatus;

    /// Drop windows that are empty after pruning. Returns how many were removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    /// Number of submitters currently tracked.
    fn tracked(&self) -> usize;
}

#[derive(Debug, Clone)]
struct WindowEntry {
    at: DateTime<Utc>,
    slot: u64,
    committed: bool,
}

/// In-process sliding windows guarded by one mutex.
pub struct SlidingWindowLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<WindowEntry>>>,
    next_slot: AtomicU64,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.max_per_window.max(1),
            window: Duration::seconds(config.window_secs.clamp(1, MAX_WINDOW_SECS) as i64),
            windows: Mutex::new(HashMap::new()),
            next_slot: AtomicU64::new(1),
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, VecDeque<WindowEntry>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(entries: &mut VecDeque<WindowEntry>, cutoff: DateTime<Utc>) {
        while entries.front().is_some_and(|e| e.at <= cutoff) {
            entries.pop_front();
        }
    }

    fn status_of(&self, entries: Option<&VecDeque<WindowEntry>>, now: DateTime<Utc>) -> QuotaStatus {
        let used = entries.map_or(0, |e| e.len()) as u32;
        let reset_at = entries
            .and_then(|e| e.front())
            .map_or(now + self.window, |oldest| oldest.at + self.window);
        QuotaStatus {
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            reset_at,
        }
    }
}

impl QuotaStore for SlidingWindowLimiter {
    fn limit(&self) -> u32 {
        self.limit
    }

    fn check_and_reserve(
        &self,
        anon_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Slot, QuotaStatus), QuotaExceeded> {
        let cutoff = now - self.window;
        let mut windows = self.windows();
        let entries = windows.entry(anon_id.to_string()).or_default();
        Self::prune(entries, cutoff);

        if entries.len() >= self.limit as usize {
            let reset_at = entries
                .front()
                .map_or(now + self.window, |oldest| oldest.at + self.window);
            debug!(%anon_id, %reset_at, "Submission quota exhausted");
            return Err(QuotaExceeded {
                limit: self.limit,
                reset_at,
            });
        }

        let slot = Slot {
            anon_id: anon_id.to_string(),
            id: self.next_slot.fetch_add(1, Ordering::Relaxed),
            at: now,
        };
        // Callers read the clock before taking the lock, so a racing request
        // can arrive with an earlier `now`. Keep the window sorted.
        let position = entries.partition_point(|e| e.at <= now);
        entries.insert(
            position,
            WindowEntry {
                at: now,
                slot: slot.id,
                committed: false,
            },
        );
        let status = self.status_of(Some(&*entries), now);
        Ok((slot, status))
    }

    fn commit(&self, slot: &Slot) {
        let mut windows = self.windows();
        let committed = windows
            .get_mut(&slot.anon_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.slot == slot.id))
            .map(|entry| entry.committed = true)
            .is_some();
        if !committed {
            warn!(anon_id = %slot.anon_id, slot = slot.id, "Committed slot no longer in window");
        }
    }

    fn release(&self, slot: &Slot) {
        let mut windows = self.windows();
        if let Some(entries) = windows.get_mut(&slot.anon_id) {
            entries.retain(|e| e.committed || e.slot != slot.id);
            if entries.is_empty() {
                windows.remove(&slot.anon_id);
            }
        }
    }

    fn status(&self, anon_id: &str, now: DateTime<Utc>) -> QuotaStatus {
        let cutoff = now - self.window;
        let mut windows = self.windows();
        if let Some(entries) = windows.get_mut(anon_id) {
            Self::prune(entries, cutoff);
        }
        self.status_of(windows.get(anon_id), now)
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let mut windows = self.windows();
        let before = windows.len();
        windows.retain(|_, entries| {
            Self::prune(entries, cutoff);
            !entries.is_empty()
        });
        before - windows.len()
    }

    fn tracked(&self) -> usize {
        self.windows().len()
    }
}

/// A slot held for one in-flight submission. Commit it once the tip is
/// stored; otherwise dropping it releases the slot.
pub struct Reservation {
    quota: Arc<dyn QuotaStore>,
    slot: Option<Slot>,
    status: QuotaStatus,
}

impl Reservation {
    /// Quota as it will look if this submission is committed.
    pub fn status(&self) -> QuotaStatus {
        self.status
    }

    pub fn commit(mut self) -> QuotaStatus {
        if let Some(slot) = self.slot.take() {
            self.quota.commit(&slot);
        }
        self.status
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            debug!(anon_id = %slot.anon_id, "Releasing unused submission slot");
            self.quota.release(&slot);
        }
    }
}

/// Result of a rate limit check.
pub enum RateLimitResult {
    /// A slot is reserved for this submission
    Allowed(Reservation),
    /// The submitter is over quota
    Limited(QuotaExceeded),
}

/// Front door to a [`QuotaStore`].
#[derive(Clone)]
pub struct RateLimiter {
    quota: Arc<dyn QuotaStore>,
}

impl RateLimiter {
    /// Create a rate limiter backed by in-memory sliding windows.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_store(Arc::new(SlidingWindowLimiter::new(config)))
    }

    pub fn with_store(quota: Arc<dyn QuotaStore>) -> Self {
        Self { quota }
    }

    pub fn limit(&self) -> u32 {
        self.quota.limit()
    }

    pub fn check_and_reserve(&self, anon_id: &str) -> RateLimitResult {
        self.check_and_reserve_at(anon_id, Utc::now())
    }

    pub fn check_and_reserve_at(&self, anon_id: &str, now: DateTime<Utc>) -> RateLimitResult {
        match self.quota.check_and_reserve(anon_id, now) {
            Ok((slot, status)) => RateLimitResult::Allowed(Reservation {
                quota: self.quota.clone(),
                slot: Some(slot),
                status,
            }),
            Err(exceeded) => RateLimitResult::Limited(exceeded),
        }
    }

    pub fn status(&self, anon_id: &str) -> QuotaStatus {
        self.quota.status(anon_id, Utc::now())
    }

    /// Clean up empty windows (should be called periodically).
    pub fn cleanup(&self) -> usize {
        let removed = self.quota.sweep(Utc::now());
        if removed > 0 {
            debug!(removed, "Swept idle rate windows");
        }
        removed
    }

    pub fn tracked(&self) -> usize {
        self.quota.tracked()
    }
}
