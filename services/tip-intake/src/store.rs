// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tip and ban storage.
//!
//! The service only needs two access patterns: a tip table keyed by ID with
//! secondary lookups by `(anon_id, timestamp)` and `(status, timestamp)`,
//! and a ban table keyed by anonymous ID. Any backend offering those can
//! implement [`TipStore`] and [`BanStore`]; [`MemoryStore`] is the
//! in-process implementation.

use crate::models::{BanRecord, Tip, TipStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Store error types.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("tip {0} already exists")]
    Conflict(String),
}

impl StoreError {
    /// Whether the caller may retry the same write.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Tip table.
#[async_trait]
pub trait TipStore: Send + Sync {
    /// Insert a new tip. Tips are immutable, so an existing ID is a conflict.
    async fn put_tip(&self, tip: Tip) -> Result<(), StoreError>;

    /// Fetch one tip by ID.
    async fn get_tip(&self, id: &str) -> Result<Option<Tip>, StoreError>;

    /// Newest tips having any of `statuses`, newest first.
    async fn recent_by_status(
        &self,
        statuses: &[TipStatus],
        limit: usize,
    ) -> Result<Vec<Tip>, StoreError>;

    /// Newest tips from one submitter, newest first.
    async fn by_submitter(&self, anon_id: &str, limit: usize) -> Result<Vec<Tip>, StoreError>;
}

/// Ban table.
#[async_trait]
pub trait BanStore: Send + Sync {
    async fn get_ban(&self, anon_id: &str) -> Result<Option<BanRecord>, StoreError>;

    /// Insert or replace the ban for `record.anon_id`.
    async fn put_ban(&self, record: BanRecord) -> Result<(), StoreError>;

    /// Remove a ban. Returns whether one existed.
    async fn delete_ban(&self, anon_id: &str) -> Result<bool, StoreError>;

    async fn list_bans(&self) -> Result<Vec<BanRecord>, StoreError>;
}

type IndexKey = (DateTime<Utc>, String);

#[derive(Debug, Default)]
struct TipTable {
    rows: HashMap<String, Tip>,
    by_submitter: HashMap<String, BTreeSet<IndexKey>>,
    by_status: HashMap<TipStatus, BTreeSet<IndexKey>>,
}

impl TipTable {
    fn newest<'a>(&'a self, index: Option<&'a BTreeSet<IndexKey>>, limit: usize) -> Vec<&'a Tip> {
        index
            .into_iter()
            .flat_map(|keys| keys.iter().rev())
            .filter_map(|(_, id)| self.rows.get(id))
            .take(limit)
            .collect()
    }
}

/// In-process store implementing both tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tips: RwLock<TipTable>,
    bans: RwLock<HashMap<String, BanRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tips.
    pub async fn tip_count(&self) -> usize {
        self.tips.read().await.rows.len()
    }
}

#[async_trait]
impl TipStore for MemoryStore {
    async fn put_tip(&self, tip: Tip) -> Result<(), StoreError> {
        let mut table = self.tips.write().await;
        if table.rows.contains_key(&tip.id) {
            return Err(StoreError::Conflict(tip.id));
        }

        let key = (tip.timestamp, tip.id.clone());
        table
            .by_submitter
            .entry(tip.anon_id.clone())
            .or_default()
            .insert(key.clone());
        table.by_status.entry(tip.status).or_default().insert(key);
        debug!(tip_id = %tip.id, status = %tip.status, "Stored tip");
        table.rows.insert(tip.id.clone(), tip);
        Ok(())
    }

    async fn get_tip(&self, id: &str) -> Result<Option<Tip>, StoreError> {
        Ok(self.tips.read().await.rows.get(id).cloned())
    }

    async fn recent_by_status(
        &self,
        statuses: &[TipStatus],
        limit: usize,
    ) -> Result<Vec<Tip>, StoreError> {
        let table = self.tips.read().await;
        let mut tips: Vec<&Tip> = statuses
            .iter()
            .flat_map(|status| table.newest(table.by_status.get(status), limit))
            .collect();
        tips.sort_by(|a, b| (b.timestamp, &b.id).cmp(&(a.timestamp, &a.id)));
        tips.dedup_by(|a, b| a.id == b.id);
        Ok(tips.into_iter().take(limit).cloned().collect())
    }

    async fn by_submitter(&self, anon_id: &str, limit: usize) -> Result<Vec<Tip>, StoreError> {
        let table = self.tips.read().await;
        Ok(table
            .newest(table.by_submitter.get(anon_id), limit)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BanStore for MemoryStore {
    async fn get_ban(&self, anon_id: &str) -> Result<Option<BanRecord>, StoreError> {
        Ok(self.bans.read().await.get(anon_id).cloned())
    }

    async fn put_ban(&self, record: BanRecord) -> Result<(), StoreError> {
        self.bans
            .write()
            .await
            .insert(record.anon_id.clone(), record);
        Ok(())
    }

    async fn delete_ban(&self, anon_id: &str) -> Result<bool, StoreError> {
        Ok(self.bans.write().await.remove(anon_id).is_some())
    }

    async fn list_bans(&self) -> Result<Vec<BanRecord>, StoreError> {
        let mut bans: Vec<BanRecord> = self.bans.read().await.values().cloned().collect();
        bans.sort_by(|a, b| b.banned_at.cmp(&a.banned_at));
        Ok(bans)
    }
}
