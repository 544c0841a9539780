//! DispatchSummary - spawn した dispatch の集計

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SubscriptionId;
use super::message::DispatchResult;

/// DispatchSummary は 1 run の件数と時刻
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub subscription: SubscriptionId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub dispatched: u64,
    pub handled: u64,
    pub unhandled: u64,
    /// The run stopped because its cancel token fired, not because the
    /// message source completed.
    pub cancelled: bool,
}

impl DispatchSummary {
    pub fn start(subscription: SubscriptionId) -> Self {
        Self {
            subscription,
            started_at: Utc::now(),
            finished_at: None,
            dispatched: 0,
            handled: 0,
            unhandled: 0,
            cancelled: false,
        }
    }

    pub fn record(&mut self, result: &DispatchResult) {
        self.dispatched += 1;
        if result.handled() {
            self.handled += 1;
        } else {
            self.unhandled += 1;
        }
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.finished_at = Some(Utc::now());
        self.cancelled = cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Orphan;
    use std::sync::Arc;

    #[test]
    fn record_splits_handled_and_unhandled() {
        let mut summary = DispatchSummary::start(SubscriptionId::generate());
        summary.record(&DispatchResult::new(Arc::new(Orphan), true));
        summary.record(&DispatchResult::new(Arc::new(Orphan), false));
        summary.record(&DispatchResult::new(Arc::new(Orphan), false));
        summary.finish(false);

        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.handled, 1);
        assert_eq!(summary.unhandled, 2);
        assert!(summary.finished_at.is_some());
    }

    #[test]
    fn unfinished_summary_omits_finished_at() {
        let summary = DispatchSummary::start(SubscriptionId::generate());
        let json = serde_json::to_value(&summary).unwrap();

        assert!(json.get("finished_at").is_none());
        assert_eq!(json["dispatched"], 0);
    }
}
