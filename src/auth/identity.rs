//! Immutable credential identity that a broker instance governs.
//!
//! An [`Identity`] bundles everything the broker may need to mint a token for one user:
//! the token endpoint, optional refresh-token credentials, optional service-account
//! material, and an optional seed token. Identities load from camelCase JSON via
//! [`Identity::from_json`] or are assembled with [`IdentityBuilder`]; both paths run
//! [`Identity::validate`].

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Token endpoint used when no `accessUrl` is configured.
pub const DEFAULT_ACCESS_URL: &str = "https://accounts.google.com/o/oauth2/token";
/// Lifetime, in seconds, of signed service-account assertions.
pub const DEFAULT_SERVICE_REQUEST_TIMEOUT: u64 = 3_600;

/// Credential identity for a single user.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	/// User the token is issued for; also the `user=` field of the wire token.
	pub user: String,
	/// OAuth client identifier used by the refresh-token grant.
	pub client_id: Option<String>,
	/// OAuth client secret used by the refresh-token grant.
	pub client_secret: Option<TokenSecret>,
	/// Long-lived refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Service-account client identifier (`iss` claim of the assertion).
	pub service_client: Option<String>,
	/// PEM-encoded RSA private key for service-account assertions.
	pub private_key: Option<TokenSecret>,
	/// Token endpoint.
	#[serde(default = "default_access_url")]
	pub access_url: Url,
	/// Seed access token.
	pub access_token: Option<TokenSecret>,
	/// Seed expiry in milliseconds since the Unix epoch.
	pub expires: Option<i64>,
	/// Seed lifetime and fallback lifetime, in seconds, when the endpoint omits `expires_in`.
	pub timeout: Option<u64>,
	/// Scope claim placed in service-account assertions.
	pub scope: Option<String>,
	/// Lifetime, in seconds, of signed service-account assertions.
	#[serde(default = "default_service_request_timeout")]
	pub service_request_timeout: u64,
	/// Extra form fields appended to every token request.
	#[serde(default)]
	pub custom_params: BTreeMap<String, String>,
	/// Extra HTTP headers attached to every token request.
	#[serde(default)]
	pub custom_headers: BTreeMap<String, String>,
}
impl Identity {
	/// Returns a builder for the provided user.
	pub fn builder(user: impl Into<String>) -> IdentityBuilder {
		IdentityBuilder::new(user)
	}

	/// Parses and validates a camelCase JSON identity.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let identity: Self = serde_path_to_error::deserialize(de)
			.map_err(|e| ConfigError::InvalidJson { source: Arc::new(e) })?;

		identity.validate()?;

		Ok(identity)
	}

	/// Checks invariants that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.user.trim().is_empty() {
			return Err(ConfigError::MissingUser);
		}
		if !matches!(self.access_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedAccessUrl { url: self.access_url.to_string() });
		}

		self.seed_expires_at()?;

		Ok(())
	}

	/// Absolute seed expiry derived from `expires`, if configured.
	pub fn seed_expires_at(&self) -> Result<Option<OffsetDateTime>, ConfigError> {
		match self.expires {
			Some(expires) if expires > 0 => {
				let nanos = i128::from(expires) * 1_000_000;

				OffsetDateTime::from_unix_timestamp_nanos(nanos)
					.map(Some)
					.map_err(|_| ConfigError::InvalidSeedExpiry { expires })
			},
			_ => Ok(None),
		}
	}

	/// Fallback token lifetime, if a positive `timeout` is configured.
	pub fn default_lifetime(&self) -> Option<Duration> {
		self.timeout.filter(|secs| *secs > 0).map(seconds)
	}

	/// Lifetime of service-account assertions.
	pub fn assertion_lifetime(&self) -> Duration {
		seconds(self.service_request_timeout)
	}
}
impl Debug for Identity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Identity")
			.field("user", &self.user)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("service_client", &self.service_client)
			.field("private_key_set", &self.private_key.is_some())
			.field("access_url", &self.access_url.as_str())
			.field("access_token_set", &self.access_token.is_some())
			.field("expires", &self.expires)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Identity`] values.
#[derive(Debug)]
pub struct IdentityBuilder {
	identity: Identity,
}
impl IdentityBuilder {
	/// Creates a builder for the provided user with default endpoint settings.
	pub fn new(user: impl Into<String>) -> Self {
		Self {
			identity: Identity {
				user: user.into(),
				client_id: None,
				client_secret: None,
				refresh_token: None,
				service_client: None,
				private_key: None,
				access_url: default_access_url(),
				access_token: None,
				expires: None,
				timeout: None,
				scope: None,
				service_request_timeout: DEFAULT_SERVICE_REQUEST_TIMEOUT,
				custom_params: BTreeMap::new(),
				custom_headers: BTreeMap::new(),
			},
		}
	}

	/// Sets the OAuth client credentials used by the refresh-token grant.
	pub fn client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
		self.identity.client_id = Some(id.into());
		self.identity.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.identity.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the service-account client identifier and its PEM private key.
	pub fn service_account(
		mut self,
		service_client: impl Into<String>,
		private_key_pem: impl Into<String>,
	) -> Self {
		self.identity.service_client = Some(service_client.into());
		self.identity.private_key = Some(TokenSecret::new(private_key_pem));

		self
	}

	/// Sets the token endpoint.
	pub fn access_url(mut self, url: Url) -> Self {
		self.identity.access_url = url;

		self
	}

	/// Parses and sets the token endpoint.
	pub fn access_url_str(self, url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(url).map_err(|source| ConfigError::InvalidAccessUrl { source })?;

		Ok(self.access_url(url))
	}

	/// Seeds the cache with an existing access token.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.identity.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the seed expiry in milliseconds since the Unix epoch.
	pub fn expires(mut self, expires_ms: i64) -> Self {
		self.identity.expires = Some(expires_ms);

		self
	}

	/// Sets the seed/fallback lifetime in seconds.
	pub fn timeout(mut self, secs: u64) -> Self {
		self.identity.timeout = Some(secs);

		self
	}

	/// Sets the scope claim for service-account assertions.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.identity.scope = Some(scope.into());

		self
	}

	/// Overrides the assertion lifetime (defaults to one hour).
	pub fn service_request_timeout(mut self, secs: u64) -> Self {
		self.identity.service_request_timeout = secs;

		self
	}

	/// Adds a form field sent with every token request.
	pub fn custom_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.identity.custom_params.insert(key.into(), value.into());

		self
	}

	/// Adds an HTTP header sent with every token request.
	pub fn custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.identity.custom_headers.insert(name.into(), value.into());

		self
	}

	/// Validates and returns the identity.
	pub fn build(self) -> Result<Identity, ConfigError> {
		self.identity.validate()?;

		Ok(self.identity)
	}
}

fn default_access_url() -> Url {
	Url::parse(DEFAULT_ACCESS_URL).expect("Default access URL must parse.")
}

fn default_service_request_timeout() -> u64 {
	DEFAULT_SERVICE_REQUEST_TIMEOUT
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
