use crate::core::sequence_gate::GateDecision;

/// Running totals of what the coordinator has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    pub accepted: u64,
    pub dropped_stale: u64,
    pub dropped_epoch: u64,
    pub gaps: u64,
    pub catch_ups_scheduled: u64,
    pub bootstraps: u64,
    pub fetch_errors: u64,
}

impl SyncCounters {
    pub(crate) fn record_gate(&mut self, decision: GateDecision) {
        match decision {
            GateDecision::Init | GateDecision::Accept => self.accepted += 1,
            GateDecision::DropStale => self.dropped_stale += 1,
            GateDecision::DropEpoch => self.dropped_epoch += 1,
            GateDecision::Gap => self.gaps += 1,
        }
    }
}
