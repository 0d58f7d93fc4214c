use std::sync::Arc;

use pilot_domain::{Clock, Error, Result, UsageCounter};

/// Compares daily usage against the plan limit.
///
/// Usage is eventually consistent: `base` is the last snapshot from the
/// billing collaborator and `pending` counts optimistic local increments it
/// has not acknowledged yet. Every check re-reads the clock so a day rollover
/// takes effect immediately.
pub struct QuotaGate {
    limit: Option<u64>,
    base: UsageCounter,
    pending: UsageCounter,
    clock: Arc<dyn Clock>,
}

impl QuotaGate {
    /// Creates a gate with no recorded usage. `None` means an unlimited plan.
    pub fn new(limit: Option<u64>, clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        Self {
            limit,
            base: UsageCounter::new(today),
            pending: UsageCounter::new(today),
            clock,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    /// Actions counted against today: authoritative plus not yet
    /// acknowledged.
    pub fn effective_usage(&self) -> u64 {
        let today = self.clock.today();
        self.base.actions_on(today) + self.pending.actions_on(today)
    }

    pub fn can_dispatch(&self) -> bool {
        match self.limit {
            Some(limit) => self.effective_usage() < limit,
            None => true,
        }
    }

    /// Refuses a new run once the allowance is used up.
    ///
    /// # Errors
    /// Returns [`Error::LimitReached`] when no action is left for today
    pub fn pre_dispatch_check(&self) -> Result<()> {
        match self.limit {
            Some(limit) if !self.can_dispatch() => {
                Err(Error::LimitReached { used: self.effective_usage(), limit })
            }
            _ => Ok(()),
        }
    }

    /// Counts one agent action locally without waiting for billing.
    pub fn on_tool_dispatched(&mut self) {
        self.pending.record(self.clock.today());
    }

    /// Adopts the billing collaborator's `snapshot` as the new base and
    /// retires `acknowledged` optimistic increments already contained in it.
    pub fn reconcile(&mut self, snapshot: UsageCounter, acknowledged: u64) {
        let today = self.clock.today();
        let pending = self.pending.actions_on(today).saturating_sub(acknowledged);

        tracing::debug!(
            authoritative = snapshot.actions_on(today),
            pending,
            "Reconciled usage"
        );

        self.base = snapshot;
        self.pending = UsageCounter::with_actions(today, pending);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, NaiveDate, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    struct FixedClock(Mutex<NaiveDate>);

    impl FixedClock {
        fn advance(&self) {
            let mut today = self.0.lock().unwrap();
            *today = today.succ_opt().unwrap();
        }
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }

        fn now(&self) -> DateTime<Utc> {
            self.today().and_hms_opt(9, 0, 0).unwrap().and_utc()
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 14).unwrap()
    }

    fn fixture(limit: Option<u64>) -> (QuotaGate, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock(Mutex::new(day())));
        (QuotaGate::new(limit, clock.clone()), clock)
    }

    #[test]
    fn test_boundary_at_limit_minus_one() {
        let (mut gate, _) = fixture(Some(5));
        gate.reconcile(UsageCounter::with_actions(day(), 4), 0);

        assert!(gate.can_dispatch());
        gate.on_tool_dispatched();

        assert_eq!(gate.effective_usage(), 5);
        assert!(!gate.can_dispatch());
    }

    #[test]
    fn test_pre_dispatch_check_reports_limit() {
        let (mut gate, _) = fixture(Some(2));
        gate.on_tool_dispatched();
        gate.on_tool_dispatched();

        let actual = gate.pre_dispatch_check();

        assert!(matches!(actual, Err(Error::LimitReached { used: 2, limit: 2 })));
    }

    #[test]
    fn test_day_rollover_resets_usage() {
        let (mut gate, clock) = fixture(Some(3));
        gate.reconcile(UsageCounter::with_actions(day(), 3), 0);
        gate.on_tool_dispatched();
        assert!(!gate.can_dispatch());

        clock.advance();

        assert_eq!(gate.effective_usage(), 0);
        assert!(gate.can_dispatch());
        assert!(gate.pre_dispatch_check().is_ok());
    }

    #[test]
    fn test_unlimited_plan_always_dispatches() {
        let (mut gate, _) = fixture(None);
        for _ in 0..1000 {
            gate.on_tool_dispatched();
        }
        assert!(gate.can_dispatch());
        assert!(gate.pre_dispatch_check().is_ok());
    }

    #[test]
    fn test_local_count_leads_authoritative_count() {
        let (mut gate, _) = fixture(Some(10));
        gate.reconcile(UsageCounter::with_actions(day(), 6), 0);
        gate.on_tool_dispatched();
        gate.on_tool_dispatched();
        gate.on_tool_dispatched();

        // Billing has only seen one of the three local actions so far.
        gate.reconcile(UsageCounter::with_actions(day(), 7), 1);
        assert_eq!(gate.effective_usage(), 9);

        gate.reconcile(UsageCounter::with_actions(day(), 9), 2);
        assert_eq!(gate.effective_usage(), 9);
    }

    #[test]
    fn test_authoritative_count_can_close_the_gate() {
        let (mut gate, _) = fixture(Some(4));
        gate.on_tool_dispatched();
        assert!(gate.can_dispatch());

        // Actions from another device push the authoritative count over.
        gate.reconcile(UsageCounter::with_actions(day(), 4), 1);

        assert!(!gate.can_dispatch());
    }

    #[test]
    fn test_stale_snapshot_counts_as_zero() {
        let (mut gate, _) = fixture(Some(4));
        let yesterday = day().pred_opt().unwrap();
        gate.reconcile(UsageCounter::with_actions(yesterday, 40), 0);

        assert_eq!(gate.effective_usage(), 0);
    }

    #[test]
    fn test_raised_limit_reopens_gate() {
        let (mut gate, _) = fixture(Some(1));
        gate.on_tool_dispatched();
        assert!(!gate.can_dispatch());

        gate.set_limit(Some(2));

        assert_eq!(gate.limit(), Some(2));
        assert!(gate.can_dispatch());
    }
}
