//! Structured logging capability injected into brokers.

// self
use crate::{_prelude::*, obs::StrategyKind};

/// Token lifecycle events reported through [`BrokerLog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogAction {
	/// Cached token handed out without renewal.
	Reuse,
	/// Renewal started.
	Renew,
	/// Caller queued behind an in-flight renewal.
	Queue,
	/// Renewal produced a fresh token.
	Renewed,
	/// Renewal failed.
	Failed,
	/// Renewal was abandoned before it settled.
	Aborted,
}
impl LogAction {
	/// Returns a stable label suitable for structured fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogAction::Reuse => "reuse",
			LogAction::Renew => "renew",
			LogAction::Queue => "queue",
			LogAction::Renewed => "renewed",
			LogAction::Failed => "failed",
			LogAction::Aborted => "aborted",
		}
	}
}

/// Structured fields attached to a log entry. Tokens are never included.
#[derive(Clone, Debug)]
pub struct LogEvent<'a> {
	/// What happened.
	pub action: LogAction,
	/// User the broker is bound to.
	pub user: &'a str,
	/// Strategy the broker renews with.
	pub strategy: StrategyKind,
	/// Expiry of the token involved, when known.
	pub expires_at: Option<OffsetDateTime>,
	/// Whether the request asked to bypass the cache.
	pub force: bool,
	/// Failure, for error-level entries.
	pub error: Option<&'a Error>,
}
impl<'a> LogEvent<'a> {
	/// Creates an event with no expiry or error attached.
	pub fn new(action: LogAction, user: &'a str, strategy: StrategyKind) -> Self {
		Self { action, user, strategy, expires_at: None, force: false, error: None }
	}

	/// Attaches the token expiry.
	pub fn with_expires_at(mut self, expires_at: Option<OffsetDateTime>) -> Self {
		self.expires_at = expires_at;

		self
	}

	/// Attaches the force flag of the triggering request.
	pub fn with_force(mut self, force: bool) -> Self {
		self.force = force;

		self
	}

	/// Attaches the failure.
	pub fn with_error(mut self, error: &'a Error) -> Self {
		self.error = Some(error);

		self
	}
}

/// Logging capability used by the broker. Implementations receive structured fields only.
pub trait BrokerLog
where
	Self: 'static + Send + Sync,
{
	/// Records a routine lifecycle event.
	fn debug(&self, event: &LogEvent<'_>);

	/// Records a failure.
	fn error(&self, event: &LogEvent<'_>);
}

/// Default logger that forwards events to `tracing` when the feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLog;
impl BrokerLog for TracingLog {
	fn debug(&self, event: &LogEvent<'_>) {
		#[cfg(feature = "tracing")]
		tracing::debug!(
			action = event.action.as_str(),
			user = event.user,
			strategy = event.strategy.as_str(),
			force = event.force,
			expires_at = ?event.expires_at,
		);
		#[cfg(not(feature = "tracing"))]
		let _ = event;
	}

	fn error(&self, event: &LogEvent<'_>) {
		#[cfg(feature = "tracing")]
		tracing::error!(
			action = event.action.as_str(),
			user = event.user,
			strategy = event.strategy.as_str(),
			force = event.force,
			error = event.error.map(tracing::field::display),
		);
		#[cfg(not(feature = "tracing"))]
		let _ = event;
	}
}

/// Logger that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLog;
impl BrokerLog for NoopLog {
	fn debug(&self, _: &LogEvent<'_>) {}

	fn error(&self, _: &LogEvent<'_>) {}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tracing_log_accepts_events_without_subscriber() {
		let err = Error::RenewalAborted;
		let event = LogEvent::new(LogAction::Failed, "user@example.com", StrategyKind::Provision)
			.with_force(true)
			.with_error(&err);

		TracingLog.debug(&LogEvent::new(LogAction::Reuse, "user@example.com", StrategyKind::None));
		TracingLog.error(&event);
		NoopLog.error(&event);

		assert_eq!(event.action.as_str(), "failed");
	}
}
