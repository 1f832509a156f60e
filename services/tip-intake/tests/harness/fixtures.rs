// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-test collaborators and service builders.

use async_trait::async_trait;
use axum::Router;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tip_intake::{
    config::Config,
    handlers::{router, AppState},
    identity::IdentityManager,
    metrics::Metrics,
    models::{BanRecord, Tip, TipStatus},
    moderation::{CategoryScore, Classification, Classifier, ClassifierError},
    service::{SubmissionRequest, TipService},
    store::{BanStore, MemoryStore, StoreError, TipStore},
};

pub const TEST_KEY: [u8; 32] = [7u8; 32];

pub fn identity() -> IdentityManager {
    IdentityManager::new(&TEST_KEY).unwrap()
}

/// Defaults with short collaborator timeouts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.moderation.classifier.timeout_ms = 100;
    config.store.timeout_ms = 500;
    config
}

pub fn request(content: &str, token: Option<&str>) -> SubmissionRequest {
    SubmissionRequest {
        content: content.to_string(),
        token: token.map(str::to_string),
        source_address: "198.51.100.7".to_string(),
        user_agent: "tip-tests/1.0".to_string(),
    }
}

/// Flags `violence` with high confidence when the content contains a
/// trigger word. Counts calls.
pub struct ScriptedClassifier {
    triggers: Vec<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(triggers: &[&'static str]) -> Self {
        Self {
            triggers: triggers.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, content: &str) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hit = self.triggers.iter().any(|t| content.contains(t));
        Ok(Classification {
            categories: vec![
                CategoryScore::new("violence", Some(if hit { 0.97 } else { 0.01 }), hit),
                CategoryScore::new("hate", Some(0.01), false),
            ],
        })
    }
}

/// Never answers within any sane timeout.
pub struct StallingClassifier;

#[async_trait]
impl Classifier for StallingClassifier {
    async fn classify(&self, _content: &str) -> Result<Classification, ClassifierError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Classification::default())
    }
}

/// Memory store whose tip writes and ban lookups can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_ban_reads: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_bans_failing(&self, failing: bool) {
        self.fail_ban_reads.store(failing, Ordering::SeqCst);
    }

    pub async fn tip_count(&self) -> usize {
        self.inner.tip_count().await
    }
}

#[async_trait]
impl TipStore for FlakyStore {
    async fn put_tip(&self, tip: Tip) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.put_tip(tip).await
    }

    async fn get_tip(&self, id: &str) -> Result<Option<Tip>, StoreError> {
        self.inner.get_tip(id).await
    }

    async fn recent_by_status(
        &self,
        statuses: &[TipStatus],
        limit: usize,
    ) -> Result<Vec<Tip>, StoreError> {
        self.inner.recent_by_status(statuses, limit).await
    }

    async fn by_submitter(&self, anon_id: &str, limit: usize) -> Result<Vec<Tip>, StoreError> {
        self.inner.by_submitter(anon_id, limit).await
    }
}

#[async_trait]
impl BanStore for FlakyStore {
    async fn get_ban(&self, anon_id: &str) -> Result<Option<BanRecord>, StoreError> {
        if self.fail_ban_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.get_ban(anon_id).await
    }

    async fn put_ban(&self, record: BanRecord) -> Result<(), StoreError> {
        self.inner.put_ban(record).await
    }

    async fn delete_ban(&self, anon_id: &str) -> Result<bool, StoreError> {
        self.inner.delete_ban(anon_id).await
    }

    async fn list_bans(&self) -> Result<Vec<BanRecord>, StoreError> {
        self.inner.list_bans().await
    }
}

pub struct Fixture {
    pub service: TipService,
    pub store: Arc<FlakyStore>,
}

pub fn fixture(config: &Config, classifier: Option<Arc<dyn Classifier>>) -> Fixture {
    let store = Arc::new(FlakyStore::default());
    let service = TipService::new(
        config,
        identity(),
        store.clone(),
        store.clone(),
        classifier,
        Arc::new(Metrics::new().unwrap()),
    )
    .unwrap();
    Fixture { service, store }
}

/// Router over a fresh service.
pub fn app(config: Config, classifier: Option<Arc<dyn Classifier>>) -> (Router, Arc<FlakyStore>) {
    let Fixture { service, store } = fixture(&config, classifier);
    let state = Arc::new(AppState { service, config });
    (router(state), store)
}
