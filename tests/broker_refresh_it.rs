#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use xoauth2_broker::{
	_preludet::*,
	broker::ReqwestTokenBroker,
	clock::{Clock, ManualClock},
	error::{InvalidResponseError, TransportError},
	obs::StrategyKind,
};

const CLIENT_ID: &str = "client-refresh";
const CLIENT_SECRET: &str = "secret-refresh";
const REFRESH_TOKEN: &str = "refresh-123";

fn build_broker(server: &MockServer) -> (ReqwestTokenBroker, ManualClock) {
	let identity = test_identity(&server.url("/token"))
		.client(CLIENT_ID, CLIENT_SECRET)
		.refresh_token(REFRESH_TOKEN)
		.timeout(120)
		.custom_param("audience", "mail")
		.custom_header("x-broker-test", "refresh")
		.build()
		.expect("Refresh identity should build.");
	let (broker, clock) = build_reqwest_test_broker(identity);

	assert_eq!(broker.strategy_kind(), StrategyKind::RefreshToken);

	(broker, clock)
}

#[tokio::test]
async fn refresh_grant_posts_form_and_caches_token() {
	let server = MockServer::start_async().await;
	let (broker, clock) = build_broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header("x-broker-test", "refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-new\",\"token_type\":\"Bearer\",\"expires_in\":1800}");
		})
		.await;
	let issued_at = clock.now();
	let token = broker.token(false).await.expect("Refresh grant should succeed.");

	assert_eq!(token, "access-new");
	assert_eq!(broker.cached().expires_at, Some(issued_at + Duration::seconds(1800)));
	assert_eq!(broker.token(false).await.expect("Cache should answer."), "access-new");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh_request() {
	let server = MockServer::start_async().await;
	let (broker, _) = build_broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(200))
				.body("{\"access_token\":\"shared\",\"expires_in\":3600}");
		})
		.await;
	let tasks = (0..10)
		.map(|_| {
			let broker = broker.clone();

			tokio::spawn(async move { broker.token(false).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let token = task.await.expect("Caller task should join.").expect("Refresh should succeed.");

		assert_eq!(token, "shared");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_expires_in_uses_identity_timeout() {
	let server = MockServer::start_async().await;
	let (broker, clock) = build_broker(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"no-expiry\"}");
		})
		.await;

	let issued_at = clock.now();

	broker.token(false).await.expect("Refresh should succeed.");

	assert_eq!(broker.cached().expires_at, Some(issued_at + Duration::seconds(120)));
}

#[tokio::test]
async fn oauth_error_is_reported_and_cache_is_untouched() {
	let server = MockServer::start_async().await;
	let identity = test_identity(&server.url("/token"))
		.client(CLIENT_ID, CLIENT_SECRET)
		.refresh_token(REFRESH_TOKEN)
		.access_token("still-cached")
		.timeout(1)
		.build()
		.expect("Refresh identity should build.");
	let (broker, clock) = build_reqwest_test_broker(identity);
	let before = broker.cached();

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Token has been revoked.\"}");
		})
		.await;
	clock.advance(Duration::seconds(5));

	let err = broker.token(false).await.expect_err("Revoked refresh token should fail.");

	match err {
		Error::InvalidResponse(InvalidResponseError::OAuth { ref error, status, .. }) => {
			assert_eq!(error, "invalid_grant");
			assert_eq!(status, 400);
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	assert!(err.to_string().contains("Token has been revoked."));
	assert_eq!(broker.cached(), before);
}

#[tokio::test]
async fn failing_endpoint_rejects_every_forced_caller() {
	let server = MockServer::start_async().await;
	let (broker, _) = build_broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).delay(std::time::Duration::from_millis(200)).body("maintenance");
		})
		.await;
	let tasks = (0..8)
		.map(|_| {
			let broker = broker.clone();

			tokio::spawn(async move { broker.token(true).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let err = task.await.expect("Caller task should join.").expect_err("Refresh should fail.");

		assert!(
			matches!(
				err,
				Error::InvalidResponse(InvalidResponseError::Status { status: 503, ref body_preview })
					if body_preview == "maintenance"
			),
			"Unexpected error: {err:?}"
		);
	}

	mock.assert_calls_async(1).await;
	assert_eq!(broker.cached().token(), None);
	assert_eq!(broker.metrics().failures(), 1);
}

#[tokio::test]
async fn missing_access_token_is_invalid_response() {
	let server = MockServer::start_async().await;
	let (broker, _) = build_broker(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body("{\"expires_in\":60}");
		})
		.await;

	let err = broker.token(false).await.expect_err("Responses without a token should fail.");

	assert!(matches!(err, Error::InvalidResponse(InvalidResponseError::MissingAccessToken)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
	// Nothing listens on the discard port.
	let identity = test_identity("http://127.0.0.1:9/token")
		.client(CLIENT_ID, CLIENT_SECRET)
		.refresh_token(REFRESH_TOKEN)
		.build()
		.expect("Refresh identity should build.");
	let (broker, _) = build_reqwest_test_broker(identity);
	let err = broker.token(true).await.expect_err("Unreachable endpoint should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Network { status: None, .. })));
}
