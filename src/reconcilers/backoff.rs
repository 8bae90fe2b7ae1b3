// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::ControllerError;
use dashmap::DashMap;
use kube::runtime::controller::Action;
use std::time::Duration;
use tracing::warn;

/// Per-key exponential retry delays for failed reconciles.
#[derive(Debug)]
pub struct ErrorBackoff {
    base: Duration,
    max: Duration,
    failures: DashMap<String, u32>,
}

impl ErrorBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: DashMap::new(),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying:
    /// base, 2x base, 4x base, ... capped at max.
    pub fn next_delay(&self, key: &str) -> Duration {
        let failures = {
            let mut entry = self.failures.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        let factor = 2u32.saturating_pow((failures - 1).min(16));
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&self, key: &str) {
        self.failures.remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.failures.get(key).map(|f| *f).unwrap_or(0)
    }

    /// Requeue action for a failed reconcile of `key`.
    ///
    /// Conflicts mean the object moved under us; refetch right away without
    /// growing the backoff.
    pub fn action_for(&self, key: &str, error: &ControllerError) -> Action {
        if error.is_conflict() {
            warn!(key, error = %error, "Conflict, requeueing immediately");
            return Action::requeue(Duration::ZERO);
        }
        let delay = self.next_delay(key);
        warn!(
            key,
            error = %error,
            retry = self.failures(key),
            delay_secs = delay.as_secs(),
            "Reconcile failed, will retry"
        );
        Action::requeue(delay)
    }
}
