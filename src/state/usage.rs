//! API usage counters and quota admission

use crate::storage::{keys, load_json, store_json, SharedStorage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Persisted API usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Requests made since the counters were created
    #[serde(default)]
    pub total_requests: u64,

    /// Requests made on the day of `last_used`
    #[serde(default)]
    pub daily_requests: u64,

    /// Quota units spent on the day of `last_used`
    #[serde(default)]
    pub quota_used: u64,

    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl UsageStats {
    /// Resets the daily counters when `today` differs from the last-used date
    ///
    /// # Returns
    ///
    /// True if the counters were reset
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        match self.last_used {
            Some(last) if last.date_naive() != today => {
                self.daily_requests = 0;
                self.quota_used = 0;
                true
            }
            _ => false,
        }
    }

    /// Records `requests` calls costing `units` quota units at `now`
    pub fn record(&mut self, requests: u64, units: u64, daily_quota: u64, now: DateTime<Utc>) {
        self.roll_over(now.date_naive());
        self.total_requests += requests;
        self.daily_requests += requests;
        self.quota_used = (self.quota_used + units).min(daily_quota);
        self.last_used = Some(now);
    }

    /// Units left today under `daily_quota`
    pub fn remaining(&self, daily_quota: u64) -> u64 {
        daily_quota.saturating_sub(self.quota_used)
    }
}

/// Shared quota ledger consulted before spending API calls
///
/// Counters are written through to storage under `api_usage_stats` after
/// every recorded call. Persistence failures are logged and otherwise ignored.
pub struct QuotaLedger {
    daily_quota: u64,
    stats: Mutex<UsageStats>,
    storage: Option<SharedStorage>,
}

impl QuotaLedger {
    /// Creates a ledger that lives only in memory
    pub fn new(daily_quota: u64) -> Self {
        Self {
            daily_quota,
            stats: Mutex::new(UsageStats::default()),
            storage: None,
        }
    }

    /// Loads the ledger from storage
    ///
    /// Missing or unreadable counters start from zero.
    pub fn load(storage: SharedStorage, daily_quota: u64) -> Self {
        let stats = {
            let guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            match load_json::<UsageStats>(&*guard, keys::API_USAGE) {
                Ok(Some(stats)) => stats,
                Ok(None) => UsageStats::default(),
                Err(e) => {
                    tracing::warn!("Discarding unreadable usage counters: {}", e);
                    UsageStats::default()
                }
            }
        };

        Self {
            daily_quota,
            stats: Mutex::new(stats),
            storage: Some(storage),
        }
    }

    pub fn daily_quota(&self) -> u64 {
        self.daily_quota
    }

    /// Checks whether `cost` units still fit in today's budget
    pub fn has_budget(&self, cost: u64) -> bool {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.roll_over(Utc::now().date_naive());
        stats.remaining(self.daily_quota) >= cost
    }

    /// Units left today
    pub fn remaining(&self) -> u64 {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.roll_over(Utc::now().date_naive());
        stats.remaining(self.daily_quota)
    }

    /// Records one or more calls and persists the counters
    pub fn record(&self, requests: u64, units: u64) {
        let snapshot = {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.record(requests, units, self.daily_quota, Utc::now());
            stats.clone()
        };

        tracing::debug!(
            "API usage: {} requests today, {} units used",
            snapshot.daily_requests,
            snapshot.quota_used
        );

        if let Some(storage) = &self.storage {
            let mut guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = store_json(&mut *guard, keys::API_USAGE, &snapshot) {
                tracing::warn!("Failed to persist usage counters: {}", e);
            }
        }
    }

    /// Returns a copy of the current counters
    pub fn snapshot(&self) -> UsageStats {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.roll_over(Utc::now().date_naive());
        stats.clone()
    }
}
