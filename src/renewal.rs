//! Token renewal: strategy selection and the single-flight coordinator.
//!
//! A broker picks one [`RenewalStrategy`] when it is built. Every cache miss goes through
//! [`RenewalCoordinator::request_token`], which lets at most one strategy invocation run at
//! a time and hands its outcome, success or failure, to every caller that queued behind it.

pub mod coordinator;
pub mod strategy;

pub use coordinator::*;
pub use strategy::*;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Token produced by a renewal strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Renewed {
	/// Freshly issued bearer token.
	pub access_token: TokenSecret,
	/// Lifetime reported by the strategy; `None` means unknown.
	pub expires_in: Option<Duration>,
}
