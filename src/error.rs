//! Broker-level error types shared by the cache, renewal strategies, and transports.
//!
//! Every error is [`Clone`] so a single failed renewal can be handed verbatim to every
//! caller that was waiting on it.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The injected provision callback reported a failure.
	#[error(transparent)]
	ProvisionCallback(#[from] ProvisionError),
	/// Transport failure (DNS, TCP, TLS, IO) while reaching the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint answered with something other than a usable token.
	#[error(transparent)]
	InvalidResponse(#[from] InvalidResponseError),
	/// Service-account assertion could not be signed.
	#[error(transparent)]
	Signing(#[from] SigningError),

	/// No cached token exists and no renewal strategy is configured.
	#[error("Can't create a new access token for `{user}`: no renewal mechanism is configured.")]
	NoRenewalMechanism {
		/// User the broker is bound to.
		user: String,
	},
	/// The caller driving the renewal was dropped before the renewal settled.
	#[error("Token renewal was abandoned before it settled.")]
	RenewalAborted,
}

/// Configuration and validation failures raised by the broker.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed (e.g., invalid custom header).
	#[error("Token request could not be built.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// Identity configuration could not be parsed.
	#[error("Identity configuration is not valid JSON.")]
	InvalidJson {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},

	/// Identity has an empty user.
	#[error("Identity user must not be empty.")]
	MissingUser,
	/// Token endpoint URL uses an unsupported scheme.
	#[error("Access URL `{url}` must use http or https.")]
	UnsupportedAccessUrl {
		/// Offending URL.
		url: String,
	},
	/// Token endpoint URL cannot be parsed.
	#[error("Access URL is invalid.")]
	InvalidAccessUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Seed expiry is outside the representable range.
	#[error("Seed expiry `{expires}` is not a valid millisecond timestamp.")]
	InvalidSeedExpiry {
		/// Offending value in milliseconds since the Unix epoch.
		expires: i64,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failure reported by a [`ProvisionCallback`](crate::renewal::ProvisionCallback).
#[derive(Clone, Debug, ThisError)]
#[error("Provision callback failed: {message}.")]
pub struct ProvisionError {
	/// Human-readable failure summary.
	pub message: String,
	/// Optional underlying cause.
	#[source]
	pub source: Option<SharedError>,
}
impl ProvisionError {
	/// Creates an error from a message.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into(), source: None }
	}

	/// Wraps an arbitrary error raised inside the callback.
	pub fn from_source(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self { message: src.to_string(), source: Some(Arc::new(src)) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
		/// HTTP status code, when one was received before the failure.
		status: Option<u16>,
	},
	/// Request timed out at the transport layer.
	#[error("Request timed out while calling the token endpoint.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[source] Arc<std::io::Error>),
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the token endpoint: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src), status: None }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		let status = e.status().map(|code| code.as_u16());

		Self::Network { source: Arc::new(e), status }
	}
}

/// Token endpoint responses that cannot be turned into a token.
#[derive(Clone, Debug, ThisError)]
pub enum InvalidResponseError {
	/// Provider returned an OAuth error object.
	#[error("Token endpoint returned an OAuth error: {}.", description.as_deref().unwrap_or(error))]
	OAuth {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code.
		status: u16,
	},
	/// Provider returned a non-2xx status without an OAuth error object.
	#[error("Token endpoint responded with HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body_preview: String,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code.
		status: u16,
	},
	/// Response omitted `access_token` or returned an empty one.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
	/// Response carried a negative `expires_in`.
	#[error("The expires_in value `{expires_in}` must not be negative.")]
	NegativeExpiresIn {
		/// Raw value returned by the provider.
		expires_in: i64,
	},
}

/// Failures raised while building a signed assertion.
#[derive(Clone, Debug, ThisError)]
pub enum SigningError {
	/// Private key is not valid RSA PEM material.
	#[error("Private key is not a valid RSA PEM key.")]
	InvalidKey {
		/// Underlying key parsing failure.
		#[source]
		source: Arc<jsonwebtoken::errors::Error>,
	},
	/// Signing itself failed.
	#[error("Assertion could not be signed.")]
	Sign {
		/// Underlying signing failure.
		#[source]
		source: Arc<jsonwebtoken::errors::Error>,
	},
}
