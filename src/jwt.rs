//! RS256 assertion signing for the service-account renewal strategy.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{_prelude::*, error::SigningError};

/// Claims carried by a service-account JWT-bearer assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountClaims {
	/// Service-account client identifier.
	pub iss: String,
	/// Requested scope, when configured.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// User the token is requested on behalf of.
	pub sub: String,
	/// Token endpoint the assertion is presented to.
	pub aud: String,
	/// Issued-at, in seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, in seconds since the Unix epoch.
	pub exp: i64,
}
impl ServiceAccountClaims {
	/// Builds claims issued at `now` and valid for `lifetime`.
	pub fn new(
		service_client: impl Into<String>,
		user: impl Into<String>,
		audience: &Url,
		scope: Option<String>,
		now: OffsetDateTime,
		lifetime: Duration,
	) -> Self {
		let iat = now.unix_timestamp();

		Self {
			iss: service_client.into(),
			scope,
			sub: user.into(),
			aud: audience.to_string(),
			iat,
			exp: iat.saturating_add(lifetime.whole_seconds()),
		}
	}
}

/// Signs `claims` with an RSA private key, producing a compact RS256 JWT.
///
/// The header is `{"alg":"RS256","typ":"JWT"}`. PKCS#1 v1.5 padding makes the output
/// byte-identical for identical claims and keys.
pub fn sign_assertion<T>(claims: &T, private_key_pem: &str) -> Result<String, SigningError>
where
	T: Serialize,
{
	let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
		.map_err(|e| SigningError::InvalidKey { source: Arc::new(e) })?;

	jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key)
		.map_err(|e| SigningError::Sign { source: Arc::new(e) })
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	use jsonwebtoken::{DecodingKey, Validation};
	use serde_json::{Value, json};
	use time::macros::datetime;
	// self
	use super::*;

	const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_rsa.pem");
	const PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_rsa.pub.pem");

	fn decode_segment(segment: &str) -> Value {
		let raw = URL_SAFE_NO_PAD.decode(segment).expect("Segment should be base64url.");

		serde_json::from_slice(&raw).expect("Segment should be JSON.")
	}

	#[test]
	fn signs_verifiable_three_segment_token() {
		let token = sign_assertion(&json!({ "some": "payload" }), PRIVATE_KEY)
			.expect("Signing with the fixture key should succeed.");
		let segments = token.split('.').collect::<Vec<_>>();

		assert_eq!(segments.len(), 3);
		assert_eq!(decode_segment(segments[0]), json!({ "alg": "RS256", "typ": "JWT" }));
		assert_eq!(decode_segment(segments[1]), json!({ "some": "payload" }));

		let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes())
			.expect("Fixture public key should parse.");
		let mut validation = Validation::new(Algorithm::RS256);

		validation.required_spec_claims.clear();
		validation.validate_exp = false;

		let verified = jsonwebtoken::decode::<Value>(&token, &key, &validation)
			.expect("Signature should verify against the fixture public key.");

		assert_eq!(verified.claims, json!({ "some": "payload" }));
	}

	#[test]
	fn signing_is_deterministic() {
		let claims = json!({ "some": "payload" });
		let first = sign_assertion(&claims, PRIVATE_KEY).expect("First signature should succeed.");
		let second =
			sign_assertion(&claims, PRIVATE_KEY).expect("Second signature should succeed.");

		assert_eq!(first, second);
	}

	#[test]
	fn malformed_key_is_a_signing_error() {
		let err = sign_assertion(&json!({ "some": "payload" }), "not a key")
			.expect_err("Garbage key material should be rejected.");

		assert!(matches!(err, SigningError::InvalidKey { .. }));
	}

	#[test]
	fn service_account_claims_cover_lifetime() {
		let audience =
			Url::parse("https://example.com/token").expect("Audience URL should parse.");
		let claims = ServiceAccountClaims::new(
			"svc@project.iam",
			"user@example.com",
			&audience,
			Some("https://mail.google.com/".into()),
			datetime!(2024-01-01 00:00 UTC),
			Duration::hours(1),
		);

		assert_eq!(claims.exp - claims.iat, 3_600);
		assert_eq!(claims.aud, "https://example.com/token");

		let encoded = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(encoded["iss"], "svc@project.iam");
		assert_eq!(encoded["sub"], "user@example.com");
		assert_eq!(encoded["scope"], "https://mail.google.com/");
	}
}
