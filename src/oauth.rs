//! Token endpoint exchanges for the refresh-token and JWT-bearer grants.
//!
//! Both grants POST an `application/x-www-form-urlencoded` body to the identity's
//! `access_url` and expect a JSON object carrying `access_token` and, optionally,
//! `expires_in`. Anything else is an [`InvalidResponseError`].

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
	error::{ConfigError, InvalidResponseError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	renewal::Renewed,
};

const BODY_PREVIEW_LIMIT: usize = 256;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// OAuth grants the broker can present to a token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// `refresh_token` grant.
	RefreshToken,
	/// RFC 7523 JWT-bearer grant.
	JwtBearer,
}
impl GrantType {
	/// Returns the `grant_type` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::RefreshToken => "refresh_token",
			GrantType::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			other => map_generic_transport_error(other),
		}
	}
}

/// Token request ready to be POSTed.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRequest {
	/// Grant presented to the endpoint.
	pub grant: GrantType,
	/// Form fields, `grant_type` included.
	pub form: Vec<(String, String)>,
}
impl TokenRequest {
	/// Starts a request for `grant`, seeding `grant_type`.
	pub fn new(grant: GrantType) -> Self {
		Self { grant, form: vec![("grant_type".into(), grant.as_str().into())] }
	}

	/// Appends a form field.
	pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.form.push((key.into(), value.into()));

		self
	}

	/// Returns the first value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Encodes the form body.
	pub fn encode_body(&self) -> String {
		FormSerializer::new(String::new()).extend_pairs(self.form.iter()).finish()
	}

	/// Builds the HTTP request, appending the identity's custom params and headers.
	pub fn to_http(&self, identity: &Identity) -> Result<HttpRequest, ConfigError> {
		let mut request = self.clone();

		for (key, value) in &identity.custom_params {
			request = request.param(key, value);
		}

		let mut builder = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(identity.access_url.as_str())
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(ACCEPT, "application/json");

		for (name, value) in &identity.custom_headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		Ok(builder.body(request.encode_body().into_bytes())?)
	}
}
impl Debug for TokenRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let keys = self.form.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>();

		f.debug_struct("TokenRequest").field("grant", &self.grant).field("keys", &keys).finish()
	}
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// POSTs `request` to the identity's token endpoint and parses the result.
pub async fn exchange<C, M>(
	http_client: &C,
	mapper: &M,
	identity: &Identity,
	request: TokenRequest,
) -> Result<Renewed>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let meta = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(meta.clone());
	let http_request = request.to_http(identity)?;
	let response = handle
		.call(http_request)
		.await
		.map_err(|err| mapper.map_transport_error(meta.take().as_ref(), err))?;

	parse_token_response(identity, &response)
}

/// Turns a token endpoint response into a [`Renewed`] token.
///
/// A missing `expires_in` falls back to the identity's `timeout`.
pub fn parse_token_response(identity: &Identity, response: &HttpResponse) -> Result<Renewed> {
	let status = response.status();
	let body = response.body();
	let de = &mut serde_json::Deserializer::from_slice(body);
	let parsed = serde_path_to_error::deserialize::<_, TokenEndpointResponse>(de);

	if !status.is_success() {
		if let Ok(TokenEndpointResponse { error: Some(error), error_description, .. }) = parsed {
			return Err(InvalidResponseError::OAuth {
				error,
				description: error_description,
				status: status.as_u16(),
			}
			.into());
		}

		return Err(InvalidResponseError::Status {
			status: status.as_u16(),
			body_preview: body_preview(body),
		}
		.into());
	}

	let parsed = parsed.map_err(|e| InvalidResponseError::Parse {
		source: Arc::new(e),
		status: status.as_u16(),
	})?;

	if let Some(error) = parsed.error {
		return Err(InvalidResponseError::OAuth {
			error,
			description: parsed.error_description,
			status: status.as_u16(),
		}
		.into());
	}

	let access_token = parsed
		.access_token
		.filter(|token| !token.is_empty())
		.ok_or(InvalidResponseError::MissingAccessToken)?;
	let expires_in = match parsed.expires_in {
		Some(secs) if secs < 0 =>
			return Err(InvalidResponseError::NegativeExpiresIn { expires_in: secs }.into()),
		Some(secs) if secs > 0 => Some(Duration::seconds(secs)),
		_ => identity.default_lifetime(),
	};

	Ok(Renewed { access_token: TokenSecret::new(access_token), expires_in })
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	text.chars().take(BODY_PREVIEW_LIMIT).collect()
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { source: Arc::new(err) }.into();
	}

	let status =
		meta.and_then(|value| value.status).or_else(|| err.status().map(|code| code.as_u16()));

	TransportError::Network { source: Arc::new(err), status }.into()
}

/// Maps the transport-independent [`HttpClientError`] variants.
pub fn map_generic_transport_error<E>(err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::from(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		other => TransportError::Other { message: other.to_string() }.into(),
	}
}
