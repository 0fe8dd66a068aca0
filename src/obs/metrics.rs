// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome as `auth_gateway_op_total{op, outcome}`.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"auth_gateway_op_total",
		"op" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how many queued callers one refresh exchange settled, in the
/// `auth_gateway_refresh_waiters` histogram.
pub fn record_refresh_waiters(waiters: usize) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("auth_gateway_refresh_waiters").record(waiters as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = waiters;
}

/// Counts a finished call in `auth_gateway_response_total{class}`.
pub fn record_response_class(status: Option<u16>) {
	#[cfg(feature = "metrics")]
	metrics::counter!("auth_gateway_response_total", "class" => status_class(status))
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = status;
}

/// Status family label: `2xx` .. `5xx`, or `none` when no response arrived.
pub fn status_class(status: Option<u16>) -> &'static str {
	match status {
		Some(100..=199) => "1xx",
		Some(200..=299) => "2xx",
		Some(300..=399) => "3xx",
		Some(400..=499) => "4xx",
		Some(500..=599) => "5xx",
		Some(_) => "other",
		None => "none",
	}
}
