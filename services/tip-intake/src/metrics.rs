// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the intake service.

use crate::moderation::PiiCategory;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    redactions: IntCounterVec,
    classifier_degraded: IntCounter,
    store_failures: IntCounter,
    active_windows: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("tip_submissions_total", "Tip submissions by outcome"),
            &["outcome"],
        )?;
        let redactions = IntCounterVec::new(
            Opts::new("tip_redactions_total", "Redacted tips by PII category"),
            &["category"],
        )?;
        let classifier_degraded = IntCounter::new(
            "tip_classifier_degraded_total",
            "Submissions moderated without the classifier",
        )?;
        let store_failures =
            IntCounter::new("tip_store_failures_total", "Failed or timed out tip writes")?;
        let active_windows =
            IntGauge::new("tip_active_windows", "Submitters with a live rate window")?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(redactions.clone()))?;
        registry.register(Box::new(classifier_degraded.clone()))?;
        registry.register(Box::new(store_failures.clone()))?;
        registry.register(Box::new(active_windows.clone()))?;

        Ok(Self {
            registry,
            submissions,
            redactions,
            classifier_degraded,
            store_failures,
            active_windows,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.submissions.with_label_values(&[outcome]).inc();
    }

    pub fn record_redactions(&self, categories: &[PiiCategory]) {
        for category in categories {
            self.redactions.with_label_values(&[category.label()]).inc();
        }
    }

    pub fn record_degraded(&self) {
        self.classifier_degraded.inc();
    }

    pub fn record_store_failure(&self) {
        self.store_failures.inc();
    }

    pub fn set_active_windows(&self, count: usize) {
        self.active_windows
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn submissions(&self, outcome: &str) -> u64 {
        self.submissions.with_label_values(&[outcome]).get()
    }

    pub fn degraded(&self) -> u64 {
        self.classifier_degraded.get()
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.get()
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
