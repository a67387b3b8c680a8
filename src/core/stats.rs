use crate::domain::ports::DeliveryOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServiceStats {
    loans_granted: AtomicU64,
    loans_refused: AtomicU64,
    returns_applied: AtomicU64,
    returns_refused: AtomicU64,
    renewals_applied: AtomicU64,
    renewals_refused: AtomicU64,
    decode_failures: AtomicU64,
    replies_delivered: AtomicU64,
    replies_dropped: AtomicU64,
}

/// Plain copy of the counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSummary {
    pub loans_granted: u64,
    pub loans_refused: u64,
    pub returns_applied: u64,
    pub returns_refused: u64,
    pub renewals_applied: u64,
    pub renewals_refused: u64,
    pub decode_failures: u64,
    pub replies_delivered: u64,
    pub replies_dropped: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_loan(&self, granted: bool) {
        bump(if granted {
            &self.loans_granted
        } else {
            &self.loans_refused
        });
    }

    pub fn record_return(&self, applied: bool) {
        bump(if applied {
            &self.returns_applied
        } else {
            &self.returns_refused
        });
    }

    pub fn record_renewal(&self, applied: bool) {
        bump(if applied {
            &self.renewals_applied
        } else {
            &self.renewals_refused
        });
    }

    pub fn record_decode_failure(&self) {
        bump(&self.decode_failures);
    }

    pub fn record_delivery(&self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => bump(&self.replies_delivered),
            DeliveryOutcome::Dropped => bump(&self.replies_dropped),
        }
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            loans_granted: self.loans_granted.load(Ordering::Relaxed),
            loans_refused: self.loans_refused.load(Ordering::Relaxed),
            returns_applied: self.returns_applied.load(Ordering::Relaxed),
            returns_refused: self.returns_refused.load(Ordering::Relaxed),
            renewals_applied: self.renewals_applied.load(Ordering::Relaxed),
            renewals_refused: self.renewals_refused.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            replies_delivered: self.replies_delivered.load(Ordering::Relaxed),
            replies_dropped: self.replies_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn log_final_stats(&self) {
        let s = self.summary();
        tracing::info!(
            "📊 Loans granted {} refused {}, returns applied {} refused {}, renewals applied {} refused {}",
            s.loans_granted,
            s.loans_refused,
            s.returns_applied,
            s.returns_refused,
            s.renewals_applied,
            s.renewals_refused
        );
        tracing::info!(
            "📊 Replies delivered {}, dropped {}, discarded records {}",
            s.replies_delivered,
            s.replies_dropped,
            s.decode_failures
        );
    }
}
