use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Count of agent-initiated actions for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounter {
    pub date: NaiveDate,
    pub ai_actions: u64,
}

impl UsageCounter {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, ai_actions: 0 }
    }

    pub fn with_actions(date: NaiveDate, ai_actions: u64) -> Self {
        Self { date, ai_actions }
    }

    /// Actions counted against `today`. A counter from another day counts as
    /// zero.
    pub fn actions_on(&self, today: NaiveDate) -> u64 {
        if self.date == today { self.ai_actions } else { 0 }
    }

    /// Adds one action for `today`, starting a fresh count on day rollover.
    pub fn record(&mut self, today: NaiveDate) {
        if self.date != today {
            *self = Self::new(today);
        }
        self.ai_actions += 1;
    }
}
