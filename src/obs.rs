//! Observability helpers for token renewals.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `xoauth2_broker.renewal` with the
//!   `strategy` and `stage` fields, and to route [`TracingLog`] events to `tracing`.
//! - Enable `metrics` to increment the `xoauth2_broker_renewal_total` counter for every
//!   attempt/success/failure/reuse, labeled by `strategy` + `outcome`.

mod log;
mod metrics;
mod tracing;

pub use log::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Renewal strategies observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
	/// Caller-supplied provision callback.
	Provision,
	/// Signed JWT-bearer assertion exchange.
	ServiceAccount,
	/// Refresh-token grant.
	RefreshToken,
	/// No renewal mechanism is configured.
	None,
}
impl StrategyKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StrategyKind::Provision => "provision",
			StrategyKind::ServiceAccount => "service_account",
			StrategyKind::RefreshToken => "refresh_token",
			StrategyKind::None => "none",
		}
	}
}
impl Display for StrategyKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// A renewal was started.
	Attempt,
	/// A renewal produced a fresh token.
	Success,
	/// A renewal failed.
	Failure,
	/// The cached token was handed out without renewal.
	Reuse,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Reuse => "reuse",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
