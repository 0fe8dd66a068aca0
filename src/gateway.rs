//! The authenticated request gateway.
//!
//! A [`Gateway`] owns one session: a credential store, the transport used for API calls
//! and refreshes, and the refresh state that keeps concurrent callers from exchanging the
//! refresh token more than once. Clones share all of it; separate gateways never interact.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use auth_gateway::{
//! 	config::GatewayConfig, gateway::Gateway, http::RequestSpec, store::MemoryStore, url::Url,
//! };
//!
//! let config = GatewayConfig::builder(Url::parse("https://admin.example.com/api/")?)
//! 	.refresh_endpoint(Url::parse("https://admin.example.com/api/auth/refresh")?)
//! 	.build()?;
//! let gateway = Gateway::new(config, Arc::new(MemoryStore::default()))?
//! 	.with_session_hook(|reason: &str| eprintln!("sign in again: {reason}"));
//! let response = gateway.send(RequestSpec::get("articles?page=1")).await?;
//!
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod dispatch;
mod metrics;

pub use coordinator::{QueuedRequest, RefreshSnapshot};
pub use metrics::GatewayMetrics;

// self
use crate::{
	_prelude::*,
	auth::Credential,
	config::GatewayConfig,
	error::ConfigError,
	exchange::{self, RefreshExchange},
	ext::RequestSigner,
	http::Transport,
	obs::gateway_event,
	store::CredentialStore,
};
use coordinator::RefreshState;

/// Receives the end-of-session notification.
///
/// Called exactly once per refresh failure, and whenever a call finds no usable session.
/// The gateway never navigates; applications typically route to their login screen here.
pub trait SessionHook
where
	Self: Send + Sync,
{
	/// Invoked with a human-readable reason once the session is over.
	fn notify_session_expired(&self, reason: &str);
}
impl<F> SessionHook for F
where
	F: Fn(&str) + Send + Sync,
{
	fn notify_session_expired(&self, reason: &str) {
		self(reason)
	}
}

/// Hook that ignores session expirations.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionHook;
impl SessionHook for NoopSessionHook {
	fn notify_session_expired(&self, _: &str) {}
}

/// Authenticated HTTP client front door with singleflight refresh.
#[derive(Clone)]
pub struct Gateway {
	config: Arc<GatewayConfig>,
	transport: Arc<dyn Transport>,
	store: Arc<dyn CredentialStore>,
	exchange: Arc<dyn RefreshExchange>,
	signer: Arc<dyn RequestSigner>,
	session_hook: Arc<dyn SessionHook>,
	state: Arc<Mutex<RefreshState>>,
	metrics: Arc<GatewayMetrics>,
}
impl Gateway {
	/// Creates a gateway backed by the built-in reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn new(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
		let transport = crate::http::ReqwestTransport::from_config(&config)?;

		Self::with_transport(config, Arc::new(transport), store)
	}

	/// Creates a gateway over a caller-supplied transport.
	///
	/// The refresh exchange and request signer are derived from `config`; override them
	/// with [`Gateway::with_exchange`] and [`Gateway::with_signer`].
	pub fn with_transport(
		config: GatewayConfig,
		transport: Arc<dyn Transport>,
		store: Arc<dyn CredentialStore>,
	) -> Result<Self, ConfigError> {
		let signer = config.signer()?;
		let exchange = exchange::from_endpoint(&config.refresh);

		Ok(Self {
			config: Arc::new(config),
			transport,
			store,
			exchange,
			signer: Arc::new(signer),
			session_hook: Arc::new(NoopSessionHook),
			state: Arc::new(Mutex::new(RefreshState::default())),
			metrics: Arc::new(GatewayMetrics::default()),
		})
	}

	/// Replaces the refresh exchange.
	pub fn with_exchange(mut self, exchange: Arc<dyn RefreshExchange>) -> Self {
		self.exchange = exchange;

		self
	}

	/// Replaces the request signer.
	pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = signer;

		self
	}

	/// Installs the end-of-session hook.
	pub fn with_session_hook<H>(mut self, hook: H) -> Self
	where
		H: 'static + SessionHook,
	{
		self.session_hook = Arc::new(hook);

		self
	}

	/// Validated configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Counters shared by every clone of this gateway.
	pub fn metrics(&self) -> &GatewayMetrics {
		&self.metrics
	}

	/// Establishes a session, replacing any stored credential.
	///
	/// A refresh still in flight is superseded: its result is discarded and queued callers
	/// continue with this credential.
	pub fn sign_in(&self, credential: Credential) -> Result<()> {
		let mut state = self.state.lock();

		state.supersede();
		self.store.set(credential).map_err(|e| {
			Error::auth_expired(format!("credential could not be stored ({e})"))
		})?;

		gateway_event!(info, "Session established.");

		Ok(())
	}

	/// Ends the session without notifying the session hook.
	pub fn sign_out(&self) -> Result<()> {
		let mut state = self.state.lock();

		state.supersede();
		self.store.clear().map_err(|e| {
			Error::auth_expired(format!("credential could not be cleared ({e})"))
		})?;

		gateway_event!(info, "Session ended by sign-out.");

		Ok(())
	}

	/// Currently stored credential, without validity checks or refreshes.
	pub fn credential(&self) -> Result<Option<Credential>> {
		self.store
			.get()
			.map_err(|e| Error::auth_expired(format!("credential store is unreadable ({e})")))
	}

	/// Ends the session when the store still holds `rejected`.
	///
	/// Runs under the refresh-state lock and supersedes any in-flight exchange, so a refresh
	/// started on the same rejected credential cannot revive the session. Returns `false` when
	/// another caller already ended the session or a different credential has been stored.
	fn expire_rejected(&self, rejected: &Credential) -> bool {
		let mut state = self.state.lock();

		match self.store.get() {
			Ok(Some(current)) if !current.same_access_token(rejected) => return false,
			Ok(None) => return false,
			_ => (),
		}

		state.supersede();
		self.clear_store();

		true
	}

	fn clear_store(&self) {
		if let Err(_e) = self.store.clear() {
			gateway_event!(warn, error = %_e, "Failed to clear the credential store.");
		}
	}

	fn notify_expired(&self, reason: &str) {
		self.metrics.record_session_expiration();

		gateway_event!(warn, reason, "Session expired.");

		self.session_hook.notify_session_expired(reason);
	}
}
impl Debug for Gateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.config.base_url.as_str())
			.field("refresh", &self.refresh_snapshot())
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
