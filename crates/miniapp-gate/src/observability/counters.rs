//! In-process usage counters served by `/api/v1/stats`.
//!
//! Injected through application state rather than kept in globals. Decision
//! counts are plain atomics; group popularity is a bounded map behind a mutex.

use crate::auth::gate::AuthDecision;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Number of groups reported in a snapshot.
pub const TOP_GROUPS_LIMIT: usize = 10;

/// Distinct group ids tallied; ids first seen after this are not counted.
pub const MAX_TRACKED_GROUPS: usize = 1_000;

/// Running totals since process start.
#[derive(Debug, Default)]
pub struct UsageCounters {
    authenticated: AtomicU64,
    anonymous: AtomicU64,
    redirected: AtomicU64,
    rejected: AtomicU64,
    selections_saved: AtomicU64,
    group_popularity: Mutex<HashMap<i64, u64>>,
}

/// Point-in-time copy of [`UsageCounters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub authenticated: u64,
    pub anonymous: u64,
    pub redirected: u64,
    pub rejected: u64,
    pub selections_saved: u64,
    pub top_groups: Vec<GroupCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub group_id: i64,
    pub selections: u64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decision(&self, decision: &AuthDecision) {
        let counter = match decision {
            AuthDecision::Authenticated(_) => &self.authenticated,
            AuthDecision::Anonymous => &self.anonymous,
            AuthDecision::Redirect(_) => &self.redirected,
            AuthDecision::Rejected(_) => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a selection. `group_id` is tallied toward popularity if present
    /// and either already known or there is room for it.
    pub fn record_selection(&self, group_id: Option<i64>) {
        self.selections_saved.fetch_add(1, Ordering::Relaxed);

        let Some(group_id) = group_id else {
            return;
        };

        match self.group_popularity.lock() {
            Ok(mut groups) => {
                if let Some(count) = groups.get_mut(&group_id) {
                    *count += 1;
                } else if groups.len() < MAX_TRACKED_GROUPS {
                    groups.insert(group_id, 1);
                } else {
                    tracing::debug!(target: "gate.counters", group_id, "Group table full, not tallied");
                }
            }
            Err(_) => {
                tracing::warn!(target: "gate.counters", "Group popularity lock poisoned, dropping sample");
            }
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let mut top_groups: Vec<GroupCount> = match self.group_popularity.lock() {
            Ok(groups) => groups
                .iter()
                .map(|(&group_id, &selections)| GroupCount {
                    group_id,
                    selections,
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        // Most popular first, ties broken by id for stable output.
        top_groups.sort_by(|a, b| {
            b.selections
                .cmp(&a.selections)
                .then(a.group_id.cmp(&b.group_id))
        });
        top_groups.truncate(TOP_GROUPS_LIMIT);

        UsageSnapshot {
            authenticated: self.authenticated.load(Ordering::Relaxed),
            anonymous: self.anonymous.load(Ordering::Relaxed),
            redirected: self.redirected.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            selections_saved: self.selections_saved.load(Ordering::Relaxed),
            top_groups,
        }
    }
}
