// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tip and ban records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Final moderation status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipStatus {
    Approved,
    Redacted,
    Rejected,
}

impl TipStatus {
    /// Statuses that may be shown publicly.
    pub const PUBLIC: [TipStatus; 2] = [TipStatus::Approved, TipStatus::Redacted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Redacted => "redacted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_public(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

impl fmt::Display for TipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored tip. Written once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub id: String,
    pub raw_content: String,
    pub moderated_content: String,
    pub anon_id: String,
    pub encrypted_metadata: String,
    pub status: TipStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub source_address: String,
}

/// A submission ban. `expires_at == None` means permanent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
    pub anon_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub banned_at: DateTime<Utc>,
    pub banned_by: String,
}

impl BanRecord {
    /// A ban is in effect until its expiry passes; expired records are
    /// simply ignored.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }
}

/// Longest finite ban (100 years); anything longer is clamped.
const MAX_BAN_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// How long a ban lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanDuration {
    Permanent,
    For(Duration),
}

impl BanDuration {
    /// Build from seconds where absent or zero means permanent.
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            None | Some(0) => Self::Permanent,
            Some(secs) => Self::For(Duration::seconds(secs.min(MAX_BAN_SECS) as i64)),
        }
    }

    /// Expiry instant for a ban placed at `now`. A zero duration is
    /// permanent, a negative one has already expired and finite bans are
    /// capped at [`MAX_BAN_SECS`].
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Permanent => None,
            Self::For(duration) if *duration == Duration::zero() => None,
            Self::For(duration) if *duration < Duration::zero() => Some(now),
            Self::For(duration) => {
                let capped = (*duration).min(Duration::seconds(MAX_BAN_SECS as i64));
                Some(
                    now.checked_add_signed(capped)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                )
            }
        }
    }
}

static LAST_TIP_NANOS: AtomicI64 = AtomicI64::new(0);

/// Next tip ID: zero-padded nanosecond timestamp, strictly increasing within
/// the process so IDs sort in submission order.
pub fn next_tip_id(now: DateTime<Utc>) -> String {
    let candidate = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
    let mut previous = LAST_TIP_NANOS.load(Ordering::Relaxed);
    loop {
        let next = candidate.max(previous.saturating_add(1));
        match LAST_TIP_NANOS.compare_exchange_weak(
            previous,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return format!("{:020}", next),
            Err(actual) => previous = actual,
        }
    }
}
