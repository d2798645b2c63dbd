//! Renewal strategies and the policy that picks one for an identity.
//!
//! Priority, first configured wins:
//!
//! 1. [`ProvisionCallback`] supplied by the caller.
//! 2. Service-account assertion (`service_client` + `private_key`).
//! 3. Refresh-token grant (`refresh_token` + `client_id` + `client_secret`).
//!
//! When nothing is configured the strategy is [`RenewalStrategy::None`] and the
//! coordinator falls back to whatever token is cached.

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
	error::{ProvisionError, SigningError},
	jwt::{self, ServiceAccountClaims},
	oauth::{GrantType, TokenRequest},
	obs::StrategyKind,
	renewal::Renewed,
};

/// Boxed future returned by [`ProvisionCallback::provision`].
pub type ProvisionFuture =
	Pin<Box<dyn Future<Output = Result<Provisioned, ProvisionError>> + 'static + Send>>;

/// Token handed back by a [`ProvisionCallback`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned {
	/// Bearer token; must not be empty.
	pub access_token: String,
	/// Lifetime in seconds; `None` or `Some(0)` falls back to the identity's `timeout`.
	pub expires_in: Option<u64>,
}
impl Provisioned {
	/// Creates a provisioned token.
	pub fn new(access_token: impl Into<String>, expires_in: Option<u64>) -> Self {
		Self { access_token: access_token.into(), expires_in }
	}

	pub(crate) fn into_renewed(self) -> Result<Renewed, ProvisionError> {
		if self.access_token.is_empty() {
			return Err(ProvisionError::new("callback returned an empty access token"));
		}

		let expires_in = self
			.expires_in
			.filter(|secs| *secs > 0)
			.map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));

		Ok(Renewed { access_token: TokenSecret::new(self.access_token), expires_in })
	}
}

/// Caller-supplied token source, consulted before any built-in grant.
///
/// Closures of the shape `Fn(String, bool) -> impl Future<Output = Result<Provisioned,
/// ProvisionError>>` implement the trait automatically; the arguments are the user and
/// the force flag of the triggering request.
pub trait ProvisionCallback
where
	Self: 'static + Send + Sync,
{
	/// Produces a fresh token for `user`.
	fn provision(&self, user: &str, force: bool) -> ProvisionFuture;
}
impl<F, Fut> ProvisionCallback for F
where
	F: 'static + Send + Sync + Fn(String, bool) -> Fut,
	Fut: 'static + Send + Future<Output = Result<Provisioned, ProvisionError>>,
{
	fn provision(&self, user: &str, force: bool) -> ProvisionFuture {
		Box::pin(self(user.to_owned(), force))
	}
}

/// Renewal mechanism chosen for an identity.
#[derive(Clone)]
pub enum RenewalStrategy {
	/// Delegate to a caller-supplied callback.
	Provision(Arc<dyn ProvisionCallback>),
	/// Exchange a signed assertion via the JWT-bearer grant.
	ServiceAccount(ServiceAccountGrant),
	/// Exchange a refresh token.
	RefreshToken(RefreshTokenGrant),
	/// Nothing configured; only cached tokens can be served.
	None,
}
impl RenewalStrategy {
	/// Picks the highest-priority strategy the identity supports.
	pub fn select(identity: &Identity, provision: Option<Arc<dyn ProvisionCallback>>) -> Self {
		if let Some(callback) = provision {
			return Self::Provision(callback);
		}
		if let Some(grant) = ServiceAccountGrant::from_identity(identity) {
			return Self::ServiceAccount(grant);
		}
		if let Some(grant) = RefreshTokenGrant::from_identity(identity) {
			return Self::RefreshToken(grant);
		}

		Self::None
	}

	/// Label for logs and metrics.
	pub fn kind(&self) -> StrategyKind {
		match self {
			Self::Provision(_) => StrategyKind::Provision,
			Self::ServiceAccount(_) => StrategyKind::ServiceAccount,
			Self::RefreshToken(_) => StrategyKind::RefreshToken,
			Self::None => StrategyKind::None,
		}
	}

	/// Returns `true` unless this is [`RenewalStrategy::None`].
	pub fn is_configured(&self) -> bool {
		!matches!(self, Self::None)
	}
}
impl Debug for RenewalStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Provision(_) => f.write_str("RenewalStrategy::Provision(..)"),
			Self::ServiceAccount(grant) =>
				f.debug_tuple("RenewalStrategy::ServiceAccount").field(grant).finish(),
			Self::RefreshToken(grant) =>
				f.debug_tuple("RenewalStrategy::RefreshToken").field(grant).finish(),
			Self::None => f.write_str("RenewalStrategy::None"),
		}
	}
}

/// Material for the service-account JWT-bearer grant.
#[derive(Clone)]
pub struct ServiceAccountGrant {
	/// Service-account client identifier (`iss`).
	pub service_client: String,
	/// PEM-encoded RSA private key.
	pub private_key: TokenSecret,
	/// Optional scope claim.
	pub scope: Option<String>,
	/// Assertion lifetime.
	pub assertion_lifetime: Duration,
}
impl ServiceAccountGrant {
	/// Extracts the grant when both the client and the key are present and non-empty.
	pub fn from_identity(identity: &Identity) -> Option<Self> {
		let service_client = identity.service_client.as_ref().filter(|value| !value.is_empty())?;
		let private_key = identity.private_key.as_ref().filter(|key| !key.is_empty())?;

		Some(Self {
			service_client: service_client.clone(),
			private_key: private_key.clone(),
			scope: identity.scope.clone(),
			assertion_lifetime: identity.assertion_lifetime(),
		})
	}

	/// Claims for an assertion issued at `now`, addressed to the identity's token endpoint.
	pub fn claims(&self, identity: &Identity, now: OffsetDateTime) -> ServiceAccountClaims {
		ServiceAccountClaims::new(
			self.service_client.clone(),
			identity.user.clone(),
			&identity.access_url,
			self.scope.clone(),
			now,
			self.assertion_lifetime,
		)
	}

	/// Signs a fresh assertion and wraps it in a JWT-bearer token request.
	pub fn token_request(
		&self,
		identity: &Identity,
		now: OffsetDateTime,
	) -> Result<TokenRequest, SigningError> {
		let assertion = jwt::sign_assertion(&self.claims(identity, now), self.private_key.expose())?;

		Ok(TokenRequest::new(GrantType::JwtBearer).param("assertion", assertion))
	}
}
impl Debug for ServiceAccountGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceAccountGrant")
			.field("service_client", &self.service_client)
			.field("scope", &self.scope)
			.field("assertion_lifetime", &self.assertion_lifetime)
			.finish_non_exhaustive()
	}
}

/// Material for the refresh-token grant.
#[derive(Clone, Debug)]
pub struct RefreshTokenGrant {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Refresh token.
	pub refresh_token: TokenSecret,
}
impl RefreshTokenGrant {
	/// Extracts the grant when the refresh token and both client credentials are present.
	pub fn from_identity(identity: &Identity) -> Option<Self> {
		let refresh_token = identity.refresh_token.as_ref().filter(|token| !token.is_empty())?;
		let client_id = identity.client_id.as_ref().filter(|id| !id.is_empty())?;
		let client_secret = identity.client_secret.as_ref().filter(|secret| !secret.is_empty())?;

		Some(Self {
			client_id: client_id.clone(),
			client_secret: client_secret.clone(),
			refresh_token: refresh_token.clone(),
		})
	}

	/// Builds the `grant_type=refresh_token` request.
	pub fn token_request(&self) -> TokenRequest {
		TokenRequest::new(GrantType::RefreshToken)
			.param("client_id", &self.client_id)
			.param("client_secret", self.client_secret.expose())
			.param("refresh_token", self.refresh_token.expose())
	}
}
