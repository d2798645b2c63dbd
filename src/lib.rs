//! Single-identity XOAUTH2 token broker: an expiry-aware bearer token cache, single-flight
//! renewal through provision callbacks, service-account assertions, or refresh tokens, and
//! SASL-ready wire tokens for SMTP/IMAP clients.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod cache;
pub mod clock;
pub mod error;
pub mod events;
pub mod http;
pub mod jwt;
pub mod oauth;
pub mod obs;
pub mod renewal;
pub mod wire;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Identity, IdentityBuilder},
		broker::{ReqwestTokenBroker, TokenBroker},
		clock::ManualClock,
		http::ReqwestHttpClient,
	};

	/// PKCS#1 RSA private key used by signing tests.
	pub const TEST_RSA_PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_rsa.pem");
	/// SPKI public half of [`TEST_RSA_PRIVATE_KEY`].
	pub const TEST_RSA_PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_rsa.pub.pem");
	/// User bound to test identities.
	pub const TEST_USER: &str = "test@example.com";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Starts an identity builder for [`TEST_USER`] pointed at `access_url`.
	pub fn test_identity(access_url: &str) -> IdentityBuilder {
		Identity::builder(TEST_USER)
			.access_url_str(access_url)
			.expect("Failed to parse test access URL.")
	}

	/// Constructs a reqwest-backed [`TokenBroker`] driven by a [`ManualClock`] so tests can
	/// move time across expiry boundaries.
	pub fn build_reqwest_test_broker(identity: Identity) -> (ReqwestTokenBroker, ManualClock) {
		let clock = ManualClock::default();
		let broker = TokenBroker::builder(identity)
			.http_client(test_reqwest_http_client())
			.clock(clock.clone())
			.build()
			.expect("Failed to build reqwest test broker.");

		(broker, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
