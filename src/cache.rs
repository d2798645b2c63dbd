//! Expiry-aware storage for the broker's current access token.

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
	error::ConfigError,
};

/// Snapshot of the cached token and its expiry.
///
/// Readers always receive both fields from the same renewal cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenState {
	/// Cached bearer token, if any.
	pub access_token: Option<TokenSecret>,
	/// Absolute expiry; `None` means no expiry is known.
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenState {
	/// Returns the token when it is non-empty, regardless of expiry.
	pub fn token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref().filter(|token| !token.is_empty())
	}

	/// A token is valid iff it is non-empty and either has no expiry or expires after `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		self.token().is_some() && self.expires_at.is_none_or(|expires_at| expires_at > now)
	}

	/// Expiry in milliseconds since the Unix epoch.
	pub fn expires_millis(&self) -> Option<i64> {
		self.expires_at.map(unix_millis)
	}
}

/// Single-writer token cache owned by the renewal coordinator.
#[derive(Debug, Default)]
pub struct TokenCache {
	state: TokenState,
}
impl TokenCache {
	/// Creates a cache holding `state`.
	pub fn new(state: TokenState) -> Self {
		Self { state }
	}

	/// Seeds the cache from an identity's `accessToken`, `expires`, and `timeout` fields.
	///
	/// An explicit `expires` wins; otherwise a positive `timeout` counts from `now`.
	pub fn seeded(identity: &Identity, now: OffsetDateTime) -> Result<Self, ConfigError> {
		let expires_at = match identity.seed_expires_at()? {
			Some(expires_at) => Some(expires_at),
			None => identity.default_lifetime().map(|lifetime| now + lifetime),
		};

		Ok(Self::new(TokenState { access_token: identity.access_token.clone(), expires_at }))
	}

	/// Returns `true` when the cached token may be handed out without renewal.
	pub fn is_valid(&self, now: OffsetDateTime) -> bool {
		self.state.is_valid_at(now)
	}

	/// Returns the current snapshot.
	pub fn get(&self) -> &TokenState {
		&self.state
	}

	/// Replaces the cached state with a freshly issued token.
	///
	/// A missing or zero lifetime means the expiry is unknown and the token never expires
	/// locally.
	pub fn set(
		&mut self,
		access_token: TokenSecret,
		lifetime: Option<Duration>,
		now: OffsetDateTime,
	) -> &TokenState {
		let expires_at =
			lifetime.filter(|lifetime| lifetime.is_positive()).map(|lifetime| now + lifetime);

		self.state = TokenState { access_token: Some(access_token), expires_at };

		&self.state
	}
}

pub(crate) fn unix_millis(at: OffsetDateTime) -> i64 {
	i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
