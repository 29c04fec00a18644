//! Per-tenant activity budgets: sliding-window call counters keyed by
//! (tenant, activity). Advisory only: budgets smooth noisy tenants, they
//! never replace safety checks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("activity budget exceeded: tenant {tenant_id} activity {activity} ({count}/{limit} in window)")]
pub struct BudgetExceeded {
    pub tenant_id: String,
    pub activity: String,
    pub count: u32,
    pub limit: u32,
}

struct WindowCounter {
    count: u32,
    window_end: Instant,
}

/// Tracks per-tenant activity call counts within fixed windows. The map is
/// small and infrequently touched, so a single mutex guards all of it.
pub struct ActivityBudget {
    counts: Mutex<HashMap<String, WindowCounter>>,
    max_per_window: u32,
    window_size: Duration,
}

fn budget_key(tenant_id: &str, activity: &str) -> String {
    format!("{tenant_id}|{activity}")
}

impl ActivityBudget {
    pub fn new(max_per_window: u32, window_size: Duration) -> Self {
        Self { counts: Mutex::new(HashMap::new()), max_per_window, window_size }
    }

    /// Errors if the tenant has exhausted the budget for this activity and
    /// the window has not yet expired.
    pub fn check(&self, tenant_id: &str, activity: &str) -> Result<(), BudgetExceeded> {
        let counts = self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(counter) = counts.get(&budget_key(tenant_id, activity)) else {
            return Ok(());
        };
        if Instant::now() >= counter.window_end {
            return Ok(()); // expired window
        }
        if counter.count >= self.max_per_window {
            return Err(BudgetExceeded {
                tenant_id: tenant_id.to_string(),
                activity: activity.to_string(),
                count: counter.count,
                limit: self.max_per_window,
            });
        }
        Ok(())
    }

    /// Records an activity call. The first record after window expiry resets
    /// both the count and the window.
    pub fn record(&self, tenant_id: &str, activity: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = budget_key(tenant_id, activity);
        let now = Instant::now();
        match counts.get_mut(&key) {
            Some(counter) if now < counter.window_end => counter.count += 1,
            _ => {
                counts.insert(
                    key,
                    WindowCounter { count: 1, window_end: now + self.window_size },
                );
            }
        }
    }
}
