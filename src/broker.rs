//! Token broker façade: one identity, one cache, one renewal strategy.

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
	cache::{TokenCache, TokenState},
	clock::{Clock, SystemClock},
	events::{SubscriptionId, TokenUpdate},
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{BrokerLog, RenewalMetrics, StrategyKind, TracingLog},
	renewal::{ProvisionCallback, RenewalCoordinator, RenewalStrategy, Renewed},
	wire,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenBroker = TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Hands out bearer tokens for a single identity, renewing them on demand.
///
/// Clones share the same cache, coordinator, and subscribers, so a broker can be passed to
/// every connection that authenticates as the same user.
pub struct TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	identity: Arc<Identity>,
	strategy: RenewalStrategy,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	coordinator: Arc<RenewalCoordinator>,
}
impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts a builder that reuses the caller-provided transport + mapper pair.
	pub fn builder_with_http_client(
		identity: Identity,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> TokenBrokerBuilder<C, M> {
		TokenBrokerBuilder {
			identity,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			provision: None,
			clock: Arc::new(SystemClock),
			log: Arc::new(TracingLog),
		}
	}

	/// Returns a usable access token, renewing it when the cache is empty or expired.
	///
	/// `force` skips the cache and renews unconditionally, unless no renewal mechanism is
	/// configured, in which case the cached token is returned as-is. Concurrent calls share a
	/// single renewal and its outcome.
	pub async fn token(&self, force: bool) -> Result<TokenSecret> {
		self.coordinator.request_token(force, self.strategy.kind(), || self.renew(force)).await
	}

	/// Builds the base64 XOAUTH2 blob for `access_token`, or for the cached token when
	/// `None`. Returns `None` when neither is available.
	///
	/// The cache is read but never renewed; call [`TokenBroker::token`] first to guarantee a
	/// fresh token.
	pub fn wire_token(&self, access_token: Option<&str>) -> Option<String> {
		match access_token {
			Some(token) => Some(wire::encode(&self.identity.user, token)),
			None => self
				.coordinator
				.snapshot()
				.token()
				.map(|token| wire::encode(&self.identity.user, token.expose())),
		}
	}

	/// Registers a callback invoked after every successful renewal, in registration order.
	///
	/// Callbacks run synchronously on the renewing task. Updates from successive renewals are
	/// delivered in the order the cache was updated; the next renewal's update waits until
	/// every callback has returned, so callbacks must not block on this broker's renewals.
	pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
	where
		F: 'static + Send + Sync + Fn(&TokenUpdate),
	{
		self.coordinator.subscribers().subscribe(callback)
	}

	/// Removes a subscription. Returns `false` if it was already gone.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.coordinator.subscribers().unsubscribe(id)
	}

	/// Snapshot of the cached token and its expiry.
	pub fn cached(&self) -> TokenState {
		self.coordinator.snapshot()
	}

	/// Returns `true` while a renewal is in flight.
	pub fn is_renewing(&self) -> bool {
		self.coordinator.is_renewing()
	}

	/// Renewal counters for this broker.
	pub fn metrics(&self) -> &RenewalMetrics {
		self.coordinator.metrics()
	}

	/// Identity this broker serves.
	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	/// Strategy selected at construction.
	pub fn strategy_kind(&self) -> StrategyKind {
		self.strategy.kind()
	}

	async fn renew(&self, force: bool) -> Result<Renewed> {
		let identity = &*self.identity;

		match &self.strategy {
			RenewalStrategy::Provision(callback) => {
				let mut renewed = callback.provision(&identity.user, force).await?.into_renewed()?;

				renewed.expires_in = renewed.expires_in.or_else(|| identity.default_lifetime());

				Ok(renewed)
			},
			RenewalStrategy::ServiceAccount(grant) => {
				let request = grant.token_request(identity, self.coordinator.now())?;

				oauth::exchange(&*self.http_client, &*self.transport_mapper, identity, request).await
			},
			RenewalStrategy::RefreshToken(grant) =>
				oauth::exchange(
					&*self.http_client,
					&*self.transport_mapper,
					identity,
					grant.token_request(),
				)
				.await,
			RenewalStrategy::None => Err(Error::NoRenewalMechanism { user: identity.user.clone() }),
		}
	}
}
#[cfg(feature = "reqwest")]
impl TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Starts a builder backed by the default reqwest transport.
	pub fn builder(
		identity: Identity,
	) -> TokenBrokerBuilder<ReqwestHttpClient, ReqwestTransportErrorMapper> {
		Self::builder_with_http_client(
			identity,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			identity: self.identity.clone(),
			strategy: self.strategy.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<C, M> Debug for TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("identity", &self.identity)
			.field("strategy", &self.strategy)
			.field("coordinator", &self.coordinator)
			.finish_non_exhaustive()
	}
}

/// Builder for [`TokenBroker`].
pub struct TokenBrokerBuilder<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	identity: Identity,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	provision: Option<Arc<dyn ProvisionCallback>>,
	clock: Arc<dyn Clock>,
	log: Arc<dyn BrokerLog>,
}
impl<C, M> TokenBrokerBuilder<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Replaces the HTTP transport.
	pub fn http_client(mut self, http_client: impl Into<Arc<C>>) -> Self {
		self.http_client = http_client.into();

		self
	}

	/// Replaces the transport error mapper.
	pub fn transport_mapper(mut self, mapper: impl Into<Arc<M>>) -> Self {
		self.transport_mapper = mapper.into();

		self
	}

	/// Installs a provision callback; it takes priority over every built-in grant.
	pub fn provision_callback<P>(mut self, callback: P) -> Self
	where
		P: ProvisionCallback,
	{
		self.provision = Some(Arc::new(callback));

		self
	}

	/// Replaces the time source used for expiry decisions and assertion timestamps.
	pub fn clock<K>(mut self, clock: K) -> Self
	where
		K: Clock,
	{
		self.clock = Arc::new(clock);

		self
	}

	/// Replaces the structured logger. Defaults to [`TracingLog`].
	pub fn log<L>(mut self, log: L) -> Self
	where
		L: BrokerLog,
	{
		self.log = Arc::new(log);

		self
	}

	/// Validates the identity, seeds the cache, and selects the renewal strategy.
	pub fn build(self) -> Result<TokenBroker<C, M>> {
		let Self { identity, http_client, transport_mapper, provision, clock, log } = self;

		identity.validate()?;

		let cache = TokenCache::seeded(&identity, clock.now())?;
		let strategy = RenewalStrategy::select(&identity, provision);
		let coordinator = RenewalCoordinator::new(identity.user.clone(), cache, clock, log);

		Ok(TokenBroker {
			identity: Arc::new(identity),
			strategy,
			http_client,
			transport_mapper,
			coordinator: Arc::new(coordinator),
		})
	}
}
impl<C, M> Debug for TokenBrokerBuilder<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBrokerBuilder")
			.field("identity", &self.identity)
			.field("provision_set", &self.provision.is_some())
			.finish_non_exhaustive()
	}
}
