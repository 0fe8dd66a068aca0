//! Gateway-level error types shared by the dispatcher, coordinator, and transports.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by [`Gateway::send`](crate::gateway::Gateway::send).
///
/// Every failed call produces exactly one of these variants; transport and storage
/// failures are folded into the taxonomy before they reach the caller.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The session is over: the refresh exchange failed, no credential exists, or the
	/// server kept rejecting a freshly refreshed credential.
	#[error("Session expired: {reason}.")]
	AuthExpired {
		/// Human-readable cause recorded by the coordinator.
		reason: String,
	},
	/// The session is valid but lacks the rights for this call (HTTP 403).
	#[error("Request was forbidden: {message}.")]
	Forbidden {
		/// Truncated response body.
		message: String,
	},
	/// The target resource does not exist (HTTP 404).
	#[error("Resource was not found: {message}.")]
	NotFound {
		/// Truncated response body.
		message: String,
	},
	/// The server failed to process the call (HTTP 5xx).
	#[error("Server returned HTTP {status}: {message}.")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		message: String,
	},
	/// No response was received.
	#[error(transparent)]
	NetworkError(#[from] TransportError),
	/// The request was refused (4xx other than 401/403/404) or could not be built.
	#[error("Request failed: {message}.")]
	RequestError {
		/// HTTP status code, absent when the request never left the process.
		status: Option<u16>,
		/// Truncated response body or local failure description.
		message: String,
	},
}
impl Error {
	/// Builds an [`Error::AuthExpired`] from any displayable reason.
	pub fn auth_expired(reason: impl Display) -> Self {
		Self::AuthExpired { reason: reason.to_string() }
	}

	/// Builds a local [`Error::RequestError`] for requests that never reached the transport.
	pub fn invalid_request(message: impl Display) -> Self {
		Self::RequestError { status: None, message: message.to_string() }
	}

	/// Returns the HTTP status associated with the error, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Forbidden { .. } => Some(403),
			Self::NotFound { .. } => Some(404),
			Self::ServerError { status, .. } => Some(*status),
			Self::RequestError { status, .. } => *status,
			Self::AuthExpired { .. } | Self::NetworkError(_) => None,
		}
	}

	/// Returns `true` when the caller must sign in again.
	pub fn is_session_over(&self) -> bool {
		matches!(self, Self::AuthExpired { .. })
	}
}

/// Configuration and validation failures raised while assembling a gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration document could not be read.
	#[error("Configuration file could not be read.")]
	Io(#[from] std::io::Error),
	/// Configuration document is not valid JSON for [`GatewayConfig`](crate::config::GatewayConfig).
	#[error("Configuration is malformed.")]
	Parse(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// An endpoint URL cannot be parsed or joined.
	#[error("Endpoint URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),

	/// The refresh endpoint was never configured.
	#[error("Missing refresh endpoint.")]
	MissingRefreshEndpoint,
	/// Endpoints must use HTTPS unless insecure endpoints are allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The base URL cannot carry relative paths (e.g. `mailto:`).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeBase {
		/// Offending URL.
		url: String,
	},
	/// OAuth 2.0 refresh exchanges need a client identifier.
	#[error("The oauth2 refresh format requires a client_id.")]
	MissingClientId,
	/// Expiry leeway must not be negative.
	#[error("Expiry leeway must not be negative.")]
	NegativeLeeway,
	/// Expiry leeway exceeds the supported maximum.
	#[error("Expiry leeway must not exceed {max}.")]
	ExcessiveLeeway {
		/// Largest accepted leeway.
		max: Duration,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
	/// Authorization header name is not a valid HTTP header name.
	#[error("Authorization header name `{name}` is invalid.")]
	InvalidHeaderName {
		/// Rejected header name.
		name: String,
	},
	/// Refresh token field name must not be empty.
	#[error("Refresh token field name must not be empty.")]
	EmptyTokenField,
	/// Response pointer must be empty or start with `/`.
	#[error("Response pointer `{pointer}` must be empty or start with `/`.")]
	InvalidResponsePointer {
		/// Rejected JSON pointer.
		pointer: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures: the call produced no HTTP response.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Endpoint that was being called.
		target: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The transport gave up waiting for a response.
	#[error("Request to {target} timed out.")]
	Timeout {
		/// Endpoint that was being called.
		target: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target: target.into(), source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		let target = e.url().map(|url| url.to_string()).unwrap_or_else(|| "<unknown>".into());

		if e.is_timeout() { Self::Timeout { target } } else { Self::network(target, e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_reflects_taxonomy() {
		assert_eq!(Error::Forbidden { message: String::new() }.status(), Some(403));
		assert_eq!(Error::NotFound { message: String::new() }.status(), Some(404));
		assert_eq!(Error::ServerError { status: 502, message: String::new() }.status(), Some(502));
		assert_eq!(Error::invalid_request("bad target").status(), None);
		assert_eq!(Error::auth_expired("refresh rejected").status(), None);
	}

	#[test]
	fn transport_error_converts_into_network_error_with_source() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
		let error: Error = TransportError::network("https://api.example.com/users", io).into();

		assert!(matches!(error, Error::NetworkError(TransportError::Network { .. })));
		assert!(!error.is_session_over());

		let source =
			StdError::source(&error).expect("Network errors should expose the transport source.");

		assert_eq!(source.to_string(), "connection reset");
	}

	#[test]
	fn auth_expired_formats_reason() {
		let error = Error::auth_expired("refresh token was rejected");

		assert!(error.is_session_over());
		assert_eq!(error.to_string(), "Session expired: refresh token was rejected.");
	}
}
