//! Single-flight renewal coordinator.
//!
//! The coordinator owns the [`TokenCache`], the in-flight marker, and the waiter queue behind
//! one mutex. Admission (reuse, queue, or lead) is decided in a single critical section, so at
//! most one strategy invocation is ever running for a broker. The leader settles the cycle by
//! updating the cache and draining the queue in the same critical section, then notifies
//! subscribers and finally wakes every waiter, in FIFO order, with a clone of its outcome.
//!
//! Successful cycles publish under a separate ordering lock taken before the cache update and
//! held until every subscriber has run, so a leader that starts while the previous cycle is
//! still notifying cannot overtake it.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	cache::{TokenCache, TokenState},
	clock::Clock,
	events::{Subscribers, TokenUpdate},
	obs::{BrokerLog, FlowOutcome, LogAction, LogEvent, RenewalMetrics, RenewalSpan, StrategyKind},
	renewal::Renewed,
};

type Waiter = oneshot::Sender<Result<TokenSecret>>;

#[derive(Debug)]
struct CoordinatorState {
	cache: TokenCache,
	// `Some` while a renewal is in flight.
	waiters: Option<Vec<Waiter>>,
}

enum Admission {
	Ready(TokenSecret),
	Queued(oneshot::Receiver<Result<TokenSecret>>),
	Lead,
}

/// Serializes renewals for one identity and fans each outcome out to every waiter.
pub struct RenewalCoordinator {
	user: String,
	clock: Arc<dyn Clock>,
	log: Arc<dyn BrokerLog>,
	subscribers: Subscribers,
	metrics: RenewalMetrics,
	state: Mutex<CoordinatorState>,
	// Serializes cache publication and subscriber notification across cycles.
	publish: Mutex<()>,
}
impl RenewalCoordinator {
	/// Creates a coordinator for `user`, starting from `cache`.
	pub fn new(
		user: impl Into<String>,
		cache: TokenCache,
		clock: Arc<dyn Clock>,
		log: Arc<dyn BrokerLog>,
	) -> Self {
		Self {
			user: user.into(),
			clock,
			log,
			subscribers: Subscribers::default(),
			metrics: RenewalMetrics::default(),
			state: Mutex::new(CoordinatorState { cache, waiters: None }),
			publish: Mutex::new(()),
		}
	}

	/// Consistent copy of the cached token and its expiry.
	pub fn snapshot(&self) -> TokenState {
		self.state.lock().cache.get().clone()
	}

	/// Returns `true` while a renewal is in flight.
	pub fn is_renewing(&self) -> bool {
		self.state.lock().waiters.is_some()
	}

	/// Number of callers queued behind the in-flight renewal.
	pub fn queued(&self) -> usize {
		self.state.lock().waiters.as_ref().map_or(0, Vec::len)
	}

	/// Token-update subscribers.
	pub fn subscribers(&self) -> &Subscribers {
		&self.subscribers
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	/// Current time according to the injected clock.
	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	/// Returns a usable token, renewing through `renew` when needed.
	///
	/// - A valid cached token is returned unless `force` is set.
	/// - With [`StrategyKind::None`], any cached token is returned even when stale or forced;
	///   without one the call fails with [`Error::NoRenewalMechanism`].
	/// - Callers arriving while a renewal is in flight wait for it and share its outcome;
	///   `renew` is not invoked for them.
	/// - A failed renewal leaves the cache untouched.
	pub async fn request_token<F, Fut>(
		&self,
		force: bool,
		kind: StrategyKind,
		renew: F,
	) -> Result<TokenSecret>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Renewed>>,
	{
		match self.admit(force, kind)? {
			Admission::Ready(token) => Ok(token),
			Admission::Queued(rx) => rx.await.unwrap_or(Err(Error::RenewalAborted)),
			Admission::Lead => {
				let mut in_flight = InFlight { coordinator: self, kind, force, settled: false };

				self.metrics.record(kind, FlowOutcome::Attempt);
				self.log.debug(&LogEvent::new(LogAction::Renew, &self.user, kind).with_force(force));

				let outcome = RenewalSpan::new(kind, "renew").instrument(renew()).await;

				in_flight.settle(outcome)
			},
		}
	}

	fn admit(&self, force: bool, kind: StrategyKind) -> Result<Admission> {
		let now = self.clock.now();
		let mut state = self.state.lock();

		// Without a mechanism any cached token, stale or not, is the best available answer.
		if (!force && state.cache.is_valid(now)) || kind == StrategyKind::None {
			let token = state.cache.get().token().cloned();
			let expires_at = state.cache.get().expires_at;

			drop(state);

			return match token {
				Some(token) => {
					self.reuse(kind, force, expires_at);

					Ok(Admission::Ready(token))
				},
				None => Err(Error::NoRenewalMechanism { user: self.user.clone() }),
			};
		}
		if let Some(waiters) = state.waiters.as_mut() {
			let (tx, rx) = oneshot::channel();

			waiters.push(tx);
			drop(state);
			self.log.debug(&LogEvent::new(LogAction::Queue, &self.user, kind).with_force(force));

			return Ok(Admission::Queued(rx));
		}

		state.waiters = Some(Vec::new());

		Ok(Admission::Lead)
	}

	fn reuse(&self, kind: StrategyKind, force: bool, expires_at: Option<OffsetDateTime>) {
		self.metrics.record(kind, FlowOutcome::Reuse);
		self.log.debug(
			&LogEvent::new(LogAction::Reuse, &self.user, kind)
				.with_force(force)
				.with_expires_at(expires_at),
		);
	}
}
impl Debug for RenewalCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RenewalCoordinator")
			.field("user", &self.user)
			.field("cache", &state.cache)
			.field("queued", &state.waiters.as_ref().map(Vec::len))
			.field("subscribers", &self.subscribers)
			.finish_non_exhaustive()
	}
}

// Marks the in-flight renewal. Dropping it unsettled (the leader's future was cancelled or
// panicked) releases every waiter with `RenewalAborted`.
struct InFlight<'a> {
	coordinator: &'a RenewalCoordinator,
	kind: StrategyKind,
	force: bool,
	settled: bool,
}
impl InFlight<'_> {
	fn settle(&mut self, outcome: Result<Renewed>) -> Result<TokenSecret> {
		self.settled = true;

		let c = self.coordinator;

		match outcome {
			Ok(Renewed { access_token, expires_in }) => {
				let publish = c.publish.lock();
				let now = c.clock.now();
				let (snapshot, waiters) = {
					let mut state = c.state.lock();
					let snapshot = state.cache.set(access_token.clone(), expires_in, now).clone();

					(snapshot, state.waiters.take().unwrap_or_default())
				};

				c.metrics.record(self.kind, FlowOutcome::Success);
				c.log.debug(
					&LogEvent::new(LogAction::Renewed, &c.user, self.kind)
						.with_force(self.force)
						.with_expires_at(snapshot.expires_at),
				);
				c.subscribers.notify(&TokenUpdate {
					user: c.user.clone(),
					access_token: access_token.clone(),
					expires_at: snapshot.expires_at,
				});
				drop(publish);

				for waiter in waiters {
					let _ = waiter.send(Ok(access_token.clone()));
				}

				Ok(access_token)
			},
			Err(err) => {
				let waiters = c.state.lock().waiters.take().unwrap_or_default();

				c.metrics.record(self.kind, FlowOutcome::Failure);
				c.log.error(
					&LogEvent::new(LogAction::Failed, &c.user, self.kind)
						.with_force(self.force)
						.with_error(&err),
				);

				for waiter in waiters {
					let _ = waiter.send(Err(err.clone()));
				}

				Err(err)
			},
		}
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}

		let c = self.coordinator;
		let waiters = c.state.lock().waiters.take().unwrap_or_default();
		let err = Error::RenewalAborted;

		c.metrics.record(self.kind, FlowOutcome::Failure);
		c.log.error(
			&LogEvent::new(LogAction::Aborted, &c.user, self.kind)
				.with_force(self.force)
				.with_error(&err),
		);

		for waiter in waiters {
			let _ = waiter.send(Err(err.clone()));
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::{clock::ManualClock, error::ProvisionError, obs::NoopLog};

	const NOW: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

	fn setup(cache: TokenCache) -> (Arc<RenewalCoordinator>, ManualClock) {
		let clock = ManualClock::new(NOW);
		let coordinator = RenewalCoordinator::new(
			"user@example.com",
			cache,
			Arc::new(clock.clone()),
			Arc::new(NoopLog),
		);

		(Arc::new(coordinator), clock)
	}

	fn renewed(token: &str, secs: i64) -> Result<Renewed> {
		Ok(Renewed {
			access_token: TokenSecret::new(token),
			expires_in: Some(Duration::seconds(secs)),
		})
	}

	async fn wait_for_queue(coordinator: &RenewalCoordinator, len: usize) {
		while coordinator.queued() < len {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn valid_cache_is_reused_without_renewal() {
		let mut cache = TokenCache::default();

		cache.set(TokenSecret::new("cached"), Some(Duration::minutes(5)), NOW);

		let (coordinator, _) = setup(cache);
		let token = coordinator
			.request_token(false, StrategyKind::Provision, || async { renewed("renewed", 60) })
			.await
			.expect("Cached token should be returned.");

		assert_eq!(token, "cached");
		assert_eq!(coordinator.metrics().reuses(), 1);
		assert_eq!(coordinator.metrics().attempts(), 0);
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_renewal() {
		let (coordinator, _) = setup(TokenCache::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let (gate_tx, gate_rx) = oneshot::channel::<()>();
		let leader = {
			let coordinator = coordinator.clone();
			let calls = calls.clone();

			tokio::spawn(async move {
				coordinator
					.request_token(false, StrategyKind::Provision, || async move {
						calls.fetch_add(1, Ordering::SeqCst);
						let _ = gate_rx.await;

						renewed("fresh", 60)
					})
					.await
			})
		};

		while !coordinator.is_renewing() {
			tokio::task::yield_now().await;
		}

		let followers = (0..8)
			.map(|_| {
				let coordinator = coordinator.clone();
				let calls = calls.clone();

				tokio::spawn(async move {
					coordinator
						.request_token(true, StrategyKind::Provision, || async move {
							calls.fetch_add(1, Ordering::SeqCst);

							renewed("duplicate", 60)
						})
						.await
				})
			})
			.collect::<Vec<_>>();

		wait_for_queue(&coordinator, 8).await;
		gate_tx.send(()).expect("Leader should still be waiting.");

		let token = leader.await.expect("Leader task should join.").expect("Leader should succeed.");

		assert_eq!(token, "fresh");

		for follower in followers {
			let token = follower.await.expect("Follower task should join.");

			assert_eq!(token.expect("Followers share the leader's token."), "fresh");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(!coordinator.is_renewing());
		assert_eq!(coordinator.snapshot().expires_at, Some(NOW + Duration::seconds(60)));
	}

	#[tokio::test]
	async fn failure_reaches_every_waiter_and_keeps_cache() {
		let mut cache = TokenCache::default();

		cache.set(TokenSecret::new("old"), Some(Duration::minutes(5)), NOW);

		let before = cache.get().clone();
		let (coordinator, _) = setup(cache);
		let (gate_tx, gate_rx) = oneshot::channel::<()>();
		let leader = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move {
				coordinator
					.request_token(true, StrategyKind::Provision, || async move {
						let _ = gate_rx.await;
						let outcome: Result<Renewed> = Err(ProvisionError::new("upstream down").into());

						outcome
					})
					.await
			})
		};

		while !coordinator.is_renewing() {
			tokio::task::yield_now().await;
		}

		let follower = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move {
				coordinator
					.request_token(true, StrategyKind::Provision, || async { renewed("x", 1) })
					.await
			})
		};

		wait_for_queue(&coordinator, 1).await;
		gate_tx.send(()).expect("Leader should still be waiting.");

		let leader_err =
			leader.await.expect("Leader task should join.").expect_err("Leader should fail.");
		let follower_err =
			follower.await.expect("Follower task should join.").expect_err("Follower should fail.");

		assert!(matches!(leader_err, Error::ProvisionCallback(_)));
		assert_eq!(leader_err.to_string(), follower_err.to_string());
		assert_eq!(coordinator.snapshot(), before);
		assert_eq!(coordinator.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn no_mechanism_reuses_stale_token_or_fails() {
		let mut cache = TokenCache::default();

		cache.set(TokenSecret::new("stale"), Some(Duration::seconds(1)), NOW);

		let (coordinator, clock) = setup(cache);

		clock.advance(Duration::minutes(10));

		let token = coordinator
			.request_token(true, StrategyKind::None, || async { renewed("never", 1) })
			.await
			.expect("Stale token should be reused.");

		assert_eq!(token, "stale");

		let (coordinator, _) = setup(TokenCache::default());
		let err = coordinator
			.request_token(false, StrategyKind::None, || async { renewed("never", 1) })
			.await
			.expect_err("Empty cache without a mechanism should fail.");

		assert!(matches!(err, Error::NoRenewalMechanism { .. }));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn overlapping_cycles_notify_in_renewal_order() {
		let (coordinator, _) = setup(TokenCache::default());
		let seen = Arc::new(Mutex::new(Vec::new()));
		let (notifying_tx, notifying_rx) = oneshot::channel::<()>();
		let notifying_tx = Mutex::new(Some(notifying_tx));

		coordinator.subscribers().subscribe({
			let seen = seen.clone();

			move |update: &TokenUpdate| {
				if update.access_token == "first" {
					if let Some(tx) = notifying_tx.lock().take() {
						let _ = tx.send(());
					}

					std::thread::sleep(std::time::Duration::from_millis(200));
				}

				seen.lock().push(update.access_token.expose().to_owned());
			}
		});

		let first = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move {
				coordinator
					.request_token(true, StrategyKind::Provision, || async { renewed("first", 60) })
					.await
			})
		};

		notifying_rx.await.expect("First cycle should reach its subscribers.");

		let second = coordinator
			.request_token(true, StrategyKind::Provision, || async { renewed("second", 60) })
			.await
			.expect("Second cycle should succeed.");

		assert_eq!(second, "second");
		assert_eq!(
			first.await.expect("First task should join.").expect("First cycle should succeed."),
			"first"
		);
		assert_eq!(*seen.lock(), ["first", "second"]);
		assert_eq!(coordinator.snapshot().token().map(TokenSecret::expose), Some("second"));
	}

	#[tokio::test]
	async fn dropped_leader_aborts_waiters() {
		let (coordinator, _) = setup(TokenCache::default());
		let leader = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move {
				coordinator
					.request_token(false, StrategyKind::Provision, || std::future::pending())
					.await
			})
		};

		while !coordinator.is_renewing() {
			tokio::task::yield_now().await;
		}

		let follower = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move {
				coordinator
					.request_token(false, StrategyKind::Provision, || async { renewed("x", 1) })
					.await
			})
		};

		wait_for_queue(&coordinator, 1).await;
		leader.abort();

		let err =
			follower.await.expect("Follower task should join.").expect_err("Follower should abort.");

		assert!(matches!(err, Error::RenewalAborted));
		assert!(!coordinator.is_renewing());
	}
}
