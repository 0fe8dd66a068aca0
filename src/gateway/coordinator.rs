//! Singleflight refresh coordination.
//!
//! Every authorized call asks [`Gateway::authorize`] for a credential. The decision (read
//! the store, inspect the refresh flag, enqueue or lead) happens under one short lock that
//! is never held across an `.await`. The first caller that finds the credential unusable
//! leads the exchange; later callers park a [`PendingRequest`] and wait on a one-shot
//! channel. When the exchange settles the leader dispatches its own replay and then every
//! queued replay in FIFO order, so transports observe a deterministic call order.

// std
use std::mem;
// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	exchange::ExchangeError,
	gateway::Gateway,
	http::{PreparedRequest, TransportFuture},
	obs::{self, OpKind, OpOutcome, OpSpan, gateway_event},
};

/// Read-only view of the refresh state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshSnapshot {
	/// Whether an exchange is in flight.
	pub refreshing: bool,
	/// Waiters in the order they will be resolved.
	pub queued: Vec<QueuedRequest>,
}

/// One waiter parked behind the in-flight exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedRequest {
	/// Monotonic ticket; lower tickets resolve first.
	pub ticket: u64,
	/// Instant the waiter was parked.
	pub enqueued_at: OffsetDateTime,
	/// `METHOD url` of the request to replay, absent for bare credential checks.
	pub target: Option<String>,
}

#[derive(Default)]
pub(super) struct RefreshState {
	refreshing: bool,
	generation: u64,
	next_ticket: u64,
	queue: VecDeque<PendingRequest>,
}
impl RefreshState {
	/// Invalidates the in-flight exchange, if any; its result will not be stored.
	pub(super) fn supersede(&mut self) {
		self.generation = self.generation.wrapping_add(1);
	}

	fn enqueue(
		&mut self,
		now: OffsetDateTime,
		replay: Option<&PreparedRequest>,
	) -> oneshot::Receiver<Result<Authorized>> {
		let (resolver, receiver) = oneshot::channel();
		let ticket = self.next_ticket;

		self.next_ticket += 1;
		self.queue.push_back(PendingRequest {
			ticket,
			enqueued_at: now,
			replay: replay.cloned(),
			resolver,
		});

		receiver
	}

	fn snapshot(&self) -> RefreshSnapshot {
		RefreshSnapshot {
			refreshing: self.refreshing,
			queued: self
				.queue
				.iter()
				.map(|pending| QueuedRequest {
					ticket: pending.ticket,
					enqueued_at: pending.enqueued_at,
					target: pending.replay.as_ref().map(PreparedRequest::label),
				})
				.collect(),
		}
	}
}

struct PendingRequest {
	ticket: u64,
	enqueued_at: OffsetDateTime,
	replay: Option<PreparedRequest>,
	resolver: oneshot::Sender<Result<Authorized>>,
}

/// Credential handed to a caller, plus its replay when the coordinator already dispatched it.
pub(super) struct Authorized {
	pub(super) credential: Credential,
	pub(super) dispatched: Option<Result<TransportFuture>>,
}

enum Decision {
	Ready(Credential),
	Wait(oneshot::Receiver<Result<Authorized>>),
	Lead { stale: Credential, generation: u64 },
	Expired(String),
}

enum Settlement {
	Renewed(Credential),
	Failed { reason: String, notify: bool },
}

// Resets the refresh state if the leading caller is dropped mid-exchange. Dropping the
// queue cancels every waiter, which then re-enters the decision and elects a new leader.
struct RefreshLease<'a> {
	state: Option<&'a Mutex<RefreshState>>,
}
impl<'a> RefreshLease<'a> {
	fn new(state: &'a Mutex<RefreshState>) -> Self {
		Self { state: Some(state) }
	}

	fn release(mut self) {
		self.state = None;
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if let Some(state) = self.state.take() {
			let mut state = state.lock();

			state.refreshing = false;
			state.queue.clear();
		}
	}
}

impl Gateway {
	/// Returns a credential that is valid at `now + expiry_leeway`, refreshing it first when
	/// needed.
	///
	/// Concurrent callers share a single exchange. Fails with [`Error::AuthExpired`] when no
	/// credential is stored or the exchange fails; the session hook is notified in both
	/// cases.
	pub async fn ensure_valid(&self) -> Result<Credential> {
		self.authorize(None, None).await.map(|authorized| authorized.credential)
	}

	/// Reports whether an exchange is in flight and who is waiting for it.
	pub fn refresh_snapshot(&self) -> RefreshSnapshot {
		self.state.lock().snapshot()
	}

	/// Obtains a usable credential for one call.
	///
	/// `rejected` marks a credential the server answered with 401; it is treated as invalid
	/// even when its expiry says otherwise. `replay` is dispatched by the coordinator when
	/// the caller ends up waiting for (or leading) an exchange.
	pub(super) async fn authorize(
		&self,
		rejected: Option<&Credential>,
		replay: Option<&PreparedRequest>,
	) -> Result<Authorized> {
		loop {
			match self.decide(rejected, replay) {
				Decision::Ready(credential) =>
					return Ok(Authorized { credential, dispatched: None }),
				Decision::Wait(receiver) => match receiver.await {
					Ok(result) => return result,
					Err(oneshot::Canceled) => {
						gateway_event!(debug, "Refresh leader went away; re-evaluating.");
					},
				},
				Decision::Lead { stale, generation } =>
					return self.lead_refresh(stale, generation, replay).await,
				Decision::Expired(reason) => {
					self.notify_expired(&reason);

					return Err(Error::auth_expired(reason));
				},
			}
		}
	}

	fn decide(&self, rejected: Option<&Credential>, replay: Option<&PreparedRequest>) -> Decision {
		let now = OffsetDateTime::now_utc();
		let mut state = self.state.lock();
		let stored = self.store.get();

		if let Ok(Some(credential)) = &stored {
			let rejected = rejected.is_some_and(|other| other.same_access_token(credential));

			// An unrepresentable deadline counts as expired.
			let usable = now
				.checked_add(self.config.expiry_leeway)
				.is_some_and(|deadline| credential.is_valid_at(deadline));

			if !rejected && usable {
				return Decision::Ready(credential.clone());
			}
		}
		if state.refreshing {
			let receiver = state.enqueue(now, replay);

			self.metrics.record_queued();
			obs::record_op_outcome(OpKind::Refresh, OpOutcome::Queued);
			gateway_event!(debug, queued = state.queue.len(), "Waiting for the in-flight refresh.");

			return Decision::Wait(receiver);
		}

		match stored {
			Ok(Some(stale)) => {
				state.refreshing = true;

				Decision::Lead { stale, generation: state.generation }
			},
			Ok(None) => Decision::Expired("no credential is stored".into()),
			Err(e) => Decision::Expired(format!("credential store is unreadable ({e})")),
		}
	}

	async fn lead_refresh(
		&self,
		stale: Credential,
		generation: u64,
		replay: Option<&PreparedRequest>,
	) -> Result<Authorized> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::refresh(&stale.fingerprint());
		let lease = RefreshLease::new(&self.state);

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_exchange();
		gateway_event!(info, fingerprint = %stale.fingerprint(), "Refreshing access credential.");

		let outcome = span
			.instrument(self.exchange.exchange(self.transport.as_ref(), &stale.refresh_token))
			.await
			.map(|grant| grant.into_credential(&stale.refresh_token));
		let (settlement, queue) = self.settle(generation, outcome);

		lease.release();
		span.record_waiters(queue.len());
		obs::record_refresh_waiters(queue.len());

		match settlement {
			Settlement::Renewed(credential) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);
				gateway_event!(
					info,
					fingerprint = %credential.fingerprint(),
					queued = queue.len(),
					"Access credential renewed."
				);

				let dispatched = replay.map(|request| self.dispatch(request, &credential));

				for pending in queue {
					// The waiter gave up; its request must not go out.
					if pending.resolver.is_canceled() {
						continue;
					}

					let dispatched =
						pending.replay.as_ref().map(|request| self.dispatch(request, &credential));
					let authorized = Authorized { credential: credential.clone(), dispatched };
					let _ = pending.resolver.send(Ok(authorized));
				}

				Ok(Authorized { credential, dispatched })
			},
			Settlement::Failed { reason, notify } => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				for pending in queue {
					let _ = pending.resolver.send(Err(Error::auth_expired(&reason)));
				}

				if notify {
					self.notify_expired(&reason);
				}

				Err(Error::auth_expired(reason))
			},
		}
	}

	fn settle(
		&self,
		generation: u64,
		outcome: Result<Credential, ExchangeError>,
	) -> (Settlement, VecDeque<PendingRequest>) {
		let mut state = self.state.lock();
		let queue = mem::take(&mut state.queue);

		state.refreshing = false;

		if state.generation != generation {
			gateway_event!(info, "Refresh result discarded after a session change.");

			let settlement = match self.store.get() {
				Ok(Some(credential)) => Settlement::Renewed(credential),
				_ => Settlement::Failed { reason: "session was signed out".into(), notify: false },
			};

			return (settlement, queue);
		}

		let outcome = outcome.and_then(|credential| {
			self.store.set(credential.clone())?;

			Ok(credential)
		});
		let settlement = match outcome {
			Ok(credential) => Settlement::Renewed(credential),
			Err(e) => {
				gateway_event!(warn, error = ?e, "Refresh exchange failed.");

				self.metrics.record_exchange_failure();
				self.clear_store();

				let reason = e.to_string().trim_end_matches('.').to_owned();

				Settlement::Failed { reason, notify: true }
			},
		};

		(settlement, queue)
	}
}
