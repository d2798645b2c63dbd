//! Token-update notifications.
//!
//! Every successful renewal produces one [`TokenUpdate`]. Subscribers are invoked
//! synchronously, in registration order, before any waiter receives the new token.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, auth::TokenSecret, cache::unix_millis};

type Subscriber = Arc<dyn Fn(&TokenUpdate) + Send + Sync>;

/// Payload delivered to subscribers after a successful renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenUpdate {
	/// User the token belongs to.
	pub user: String,
	/// Freshly issued token.
	pub access_token: TokenSecret,
	/// Absolute expiry, when known.
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenUpdate {
	/// Expiry in milliseconds since the Unix epoch.
	pub fn expires_millis(&self) -> Option<i64> {
		self.expires_at.map(unix_millis)
	}
}

/// Handle returned by [`Subscribers::subscribe`]; pass it back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Ordered registry of token-update callbacks.
#[derive(Default)]
pub struct Subscribers {
	next_id: AtomicU64,
	entries: RwLock<Vec<(SubscriptionId, Subscriber)>>,
}
impl Subscribers {
	/// Registers `callback` and returns its handle.
	pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
	where
		F: 'static + Send + Sync + Fn(&TokenUpdate),
	{
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.entries.write().push((id, Arc::new(callback)));

		id
	}

	/// Removes a subscription. Returns `false` if the handle was unknown.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|(entry, _)| *entry != id);

		entries.len() != before
	}

	/// Number of live subscriptions.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nobody is subscribed.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Invokes every subscriber in registration order.
	///
	/// The registry lock is released before callbacks run, so a callback may subscribe or
	/// unsubscribe without deadlocking.
	pub fn notify(&self, update: &TokenUpdate) {
		let snapshot =
			self.entries.read().iter().map(|(_, callback)| callback.clone()).collect::<Vec<_>>();

		for callback in snapshot {
			callback(update);
		}
	}
}
impl Debug for Subscribers {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscribers").field("len", &self.len()).finish()
	}
}
