use derive_setters::Setters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct QuotaConfig {
    /// Maximum agent actions per calendar day. `None` means the plan is
    /// unlimited.
    pub daily_action_limit: Option<u64>,
}
