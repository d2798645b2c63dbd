//! Time sources consulted for expiry decisions.

// self
use crate::_prelude::*;

/// Source of the current instant.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Returns "now" in UTC.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same instant, so a test can keep one handle while the broker holds
/// another.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `at`.
	pub fn new(at: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(at)))
	}

	/// Moves the clock forward (or backward, for negative values).
	pub fn advance(&self, by: Duration) {
		*self.0.lock() += by;
	}

	/// Jumps to an absolute instant.
	pub fn set(&self, at: OffsetDateTime) {
		*self.0.lock() = at;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}
