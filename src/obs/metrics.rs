// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{FlowOutcome, StrategyKind};

/// Records a renewal outcome via the global metrics recorder (when enabled).
pub fn record_renewal_outcome(kind: StrategyKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"xoauth2_broker_renewal_total",
			"strategy" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Per-broker counters, always available regardless of the `metrics` feature.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	reuse: AtomicU64,
}
impl RenewalMetrics {
	/// Number of renewals that reached a strategy.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Number of renewals that produced a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Number of renewals that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Number of requests answered from the cache, including stale reuse.
	pub fn reuses(&self) -> u64 {
		self.reuse.load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, kind: StrategyKind, outcome: FlowOutcome) {
		let counter = match outcome {
			FlowOutcome::Attempt => &self.attempts,
			FlowOutcome::Success => &self.success,
			FlowOutcome::Failure => &self.failure,
			FlowOutcome::Reuse => &self.reuse,
		};

		counter.fetch_add(1, Ordering::Relaxed);
		record_renewal_outcome(kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn counters_track_each_outcome() {
		let metrics = RenewalMetrics::default();

		metrics.record(StrategyKind::Provision, FlowOutcome::Attempt);
		metrics.record(StrategyKind::Provision, FlowOutcome::Success);
		metrics.record(StrategyKind::Provision, FlowOutcome::Reuse);
		metrics.record(StrategyKind::Provision, FlowOutcome::Reuse);

		assert_eq!(metrics.attempts(), 1);
		assert_eq!(metrics.successes(), 1);
		assert_eq!(metrics.failures(), 0);
		assert_eq!(metrics.reuses(), 2);
	}
}
