// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission bans on top of the ban table.
//!
//! Expired bans are never actively deleted here: a record whose expiry has
//! passed is treated as absent.

use crate::models::{BanDuration, BanRecord};
use crate::store::{BanStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

pub struct BanManager {
    store: Arc<dyn BanStore>,
}

impl BanManager {
    pub fn new(store: Arc<dyn BanStore>) -> Self {
        Self { store }
    }

    /// The ban currently in effect for `anon_id`, if any.
    pub async fn active_ban(&self, anon_id: &str) -> Result<Option<BanRecord>, StoreError> {
        self.active_ban_at(anon_id, Utc::now()).await
    }

    pub async fn active_ban_at(
        &self,
        anon_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRecord>, StoreError> {
        Ok(self
            .store
            .get_ban(anon_id)
            .await?
            .filter(|ban| ban.is_active_at(now)))
    }

    pub async fn is_banned(&self, anon_id: &str) -> Result<bool, StoreError> {
        Ok(self.active_ban(anon_id).await?.is_some())
    }

    /// Place or replace a ban.
    pub async fn ban(
        &self,
        anon_id: &str,
        duration: BanDuration,
        reason: &str,
        actor: &str,
    ) -> Result<BanRecord, StoreError> {
        let now = Utc::now();
        let record = BanRecord {
            anon_id: anon_id.to_string(),
            expires_at: duration.expires_at(now),
            reason: reason.to_string(),
            banned_at: now,
            banned_by: actor.to_string(),
        };
        self.store.put_ban(record.clone()).await?;

        info!(
            anon_id = %anon_id,
            expires_at = ?record.expires_at,
            banned_by = %actor,
            "Submitter banned"
        );
        Ok(record)
    }

    /// Lift a ban. Returns whether one existed.
    pub async fn unban(&self, anon_id: &str) -> Result<bool, StoreError> {
        let removed = self.store.delete_ban(anon_id).await?;
        if removed {
            info!(anon_id = %anon_id, "Submitter unbanned");
        }
        Ok(removed)
    }

    /// All bans still in effect, newest first.
    pub async fn list_active(&self) -> Result<Vec<BanRecord>, StoreError> {
        let now = Utc::now();
        Ok(self
            .store
            .list_bans()
            .await?
            .into_iter()
            .filter(|ban| ban.is_active_at(now))
            .collect())
    }
}
