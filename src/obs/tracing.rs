// self
use crate::{_prelude::*, obs::OpKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span around one gateway operation.
///
/// Sends carry the request target and, once known, the response status. Refreshes carry the
/// fingerprint of the credential being replaced and the number of waiters they settled.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Span for [`Gateway::send`](crate::gateway::Gateway::send) and its 401 retry.
	pub fn send(kind: OpKind, target: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"auth_gateway.send",
				op = kind.as_str(),
				target,
				status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, target);

			Self {}
		}
	}

	/// Span for a refresh exchange led by this caller.
	pub fn refresh(fingerprint: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"auth_gateway.refresh",
				op = OpKind::Refresh.as_str(),
				fingerprint,
				waiters = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = fingerprint;

			Self {}
		}
	}

	/// Records the HTTP status the operation ended with.
	pub fn record_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		self.span.record("status", status);
		#[cfg(not(feature = "tracing"))]
		let _ = status;
	}

	/// Records how many queued callers the refresh settled.
	pub fn record_waiters(&self, waiters: usize) {
		#[cfg(feature = "tracing")]
		self.span.record("waiters", waiters);
		#[cfg(not(feature = "tracing"))]
		let _ = waiters;
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
