//! Optional observability helpers for gateway operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit `auth_gateway.send` spans (`op`, `target`, `status`) and
//!   `auth_gateway.refresh` spans (`fingerprint`, `waiters`), plus events for queued waiters,
//!   401 retries, and session expirations. Events carry credential fingerprints, never secrets.
//! - Enable `metrics` to record `auth_gateway_op_total{op, outcome}`,
//!   `auth_gateway_response_total{class}`, and the `auth_gateway_refresh_waiters` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Gateway operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Authorized request issued through [`Gateway::send`](crate::gateway::Gateway::send).
	Send,
	/// Credential check and, when needed, the refresh exchange.
	Refresh,
	/// Single retry after the server rejected a credential with 401.
	Retry,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Send => "send",
			OpKind::Refresh => "refresh",
			OpKind::Retry => "retry",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// The caller parked behind an in-flight refresh.
	Queued,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Queued => "queued",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a `tracing` event under the `auth_gateway` target when the feature is enabled.
///
/// Arguments must be inline expressions; they are not evaluated without `tracing`.
macro_rules! gateway_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		::tracing::$level!(target: "auth_gateway", $($arg)+);
	};
}
pub(crate) use gateway_event;
