//! Demonstrates a caller-supplied provision callback with token-update subscribers.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use color_eyre::Result;
// self
use xoauth2_broker::{
	auth::Identity,
	broker::TokenBroker,
	error::ProvisionError,
	events::TokenUpdate,
	renewal::Provisioned,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let counter = AtomicU64::new(0);
	let broker = TokenBroker::builder(Identity::builder("mailer@example.com").build()?)
		.provision_callback(move |user: String, force: bool| {
			let n = counter.fetch_add(1, Ordering::Relaxed) + 1;

			async move {
				println!("Provisioning token #{n} for {user} (force: {force}).");

				Ok::<_, ProvisionError>(Provisioned::new(format!("vault-token-{n}"), Some(300)))
			}
		})
		.build()?;
	let subscription = broker.subscribe(|update: &TokenUpdate| {
		println!("Token for {} renewed; expires at {:?}.", update.user, update.expires_millis());
	});

	broker.token(false).await?;
	broker.token(true).await?;
	broker.unsubscribe(subscription);

	let token = broker.token(true).await?;

	println!("AUTH XOAUTH2 {}", broker.wire_token(Some(token.expose())).unwrap_or_default());
	println!(
		"Renewals: {} attempted, {} succeeded, {} reused.",
		broker.metrics().attempts(),
		broker.metrics().successes(),
		broker.metrics().reuses()
	);

	Ok(())
}
