// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for gateway activity.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
	requests: AtomicU64,
	exchanges: AtomicU64,
	exchange_failures: AtomicU64,
	queued: AtomicU64,
	retries: AtomicU64,
	session_expirations: AtomicU64,
}
impl GatewayMetrics {
	/// Returns the number of requests passed to `send`.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh exchanges issued.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh exchanges that ended the session.
	pub fn exchange_failures(&self) -> u64 {
		self.exchange_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that waited behind an in-flight refresh.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	/// Returns the number of retries issued after a 401.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of session hook notifications.
	pub fn session_expirations(&self) -> u64 {
		self.session_expirations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange_failure(&self) {
		self.exchange_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_session_expiration(&self) {
		self.session_expirations.fetch_add(1, Ordering::Relaxed);
	}
}
