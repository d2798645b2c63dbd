//! Demonstrates renewing an XOAUTH2 token through the refresh-token grant against a mock
//! token endpoint, then building the SASL blob an SMTP or IMAP client would send.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use xoauth2_broker::{
	auth::Identity,
	broker::TokenBroker,
	http::ReqwestHttpClient,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let identity = Identity::builder("mailer@example.com")
		.client("demo-client", "super-secret")
		.refresh_token("demo-refresh")
		.access_url_str(&server.url("/token"))?
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let broker = TokenBroker::builder(identity).http_client(http_client).build()?;
	let token = broker.token(false).await?;
	// Served from the cache; no second request hits the endpoint.
	let again = broker.token(false).await?;

	assert_eq!(token, again);

	println!("Access token: {}.", token.expose());
	println!("AUTH XOAUTH2 {}", broker.wire_token(None).unwrap_or_default());

	token_mock.assert_async().await;

	Ok(())
}
