//! Refresh exchanges: the single network call that trades a refresh token for a new access
//! credential.
//!
//! The gateway never talks to the refresh endpoint directly; it drives a [`RefreshExchange`]
//! through the same [`Transport`] used for API calls. Two wire formats ship with the crate:
//! [`JsonRefreshExchange`] for the JSON envelopes typical of admin backends and
//! [`OAuth2RefreshExchange`] for RFC 6749 token endpoints.

pub mod json;
pub mod oauth;

pub use json::JsonRefreshExchange;
pub use oauth::OAuth2RefreshExchange;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret, claims},
	config::{ExchangeFormat, RefreshEndpoint},
	error::TransportError,
	http::Transport,
	store::StoreError,
};

/// Boxed future returned by [`RefreshExchange::exchange`].
pub type ExchangeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ExchangeGrant, ExchangeError>> + 'a + Send>>;

/// Performs the refresh exchange through the provided transport.
///
/// Implementations issue exactly one request per call and never retry; the coordinator
/// guarantees at most one call is in flight per gateway.
pub trait RefreshExchange
where
	Self: Send + Sync,
{
	/// Trades `refresh_token` for a new access credential.
	fn exchange<'a>(
		&'a self,
		transport: &'a dyn Transport,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a>;
}

/// Tokens issued by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the server issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry of the new access token.
	pub expires_at: OffsetDateTime,
}
impl ExchangeGrant {
	/// Builds the renewed credential, keeping `previous` when no refresh token was issued.
	pub fn into_credential(self, previous: &TokenSecret) -> Credential {
		Credential {
			access_token: self.access_token,
			refresh_token: self.refresh_token.unwrap_or_else(|| previous.clone()),
			expires_at: self.expires_at,
		}
	}
}
impl Debug for ExchangeGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token_rotated", &self.refresh_token.is_some())
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Failures of a refresh exchange. Every variant ends the session.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// The endpoint answered but refused the refresh token.
	#[error("Refresh endpoint rejected the refresh token: {reason}.")]
	Rejected {
		/// HTTP status, when known.
		status: Option<u16>,
		/// Server-provided description or truncated body.
		reason: String,
	},
	/// No response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The response body is not a token payload.
	#[error("Refresh response is malformed.")]
	MalformedResponse {
		/// Parse failure with the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status, when known.
		status: Option<u16>,
	},
	/// The configured envelope pointer selects nothing.
	#[error("Refresh response has no payload at `{pointer}`.")]
	MissingEnvelope {
		/// JSON pointer that failed to resolve.
		pointer: String,
	},
	/// The response carries an empty access token.
	#[error("Refresh response carries an empty access token.")]
	EmptyAccessToken,
	/// Neither an expiry field nor a JWT `exp` claim is available.
	#[error("Refresh response carries no usable expiry.")]
	MissingExpiry,
	/// `expires_in` is zero or negative.
	#[error("Refresh response expires_in must be positive.")]
	NonPositiveExpiresIn,
	/// Expiry cannot be represented as an instant.
	#[error("Refresh response expiry is out of range.")]
	ExpiryOutOfRange,
	/// The exchange request could not be built.
	#[error("Refresh request could not be built: {message}.")]
	Request {
		/// Local failure description.
		message: String,
	},
	/// The renewed credential could not be written to the store.
	#[error("Renewed credential could not be persisted.")]
	Persist(#[from] StoreError),
}

/// Instantiates the built-in exchange described by a refresh endpoint configuration.
pub fn from_endpoint(endpoint: &RefreshEndpoint) -> Arc<dyn RefreshExchange> {
	match endpoint.format {
		ExchangeFormat::Json => Arc::new(JsonRefreshExchange::from_endpoint(endpoint)),
		ExchangeFormat::OAuth2 => Arc::new(OAuth2RefreshExchange::from_endpoint(endpoint)),
	}
}

/// Resolves the absolute expiry of an issued access token.
///
/// Precedence: relative `expires_in` seconds, absolute `expires_at` unix seconds, then the
/// JWT `exp` claim of the access token.
pub(crate) fn resolve_expiry(
	issued_at: OffsetDateTime,
	expires_in: Option<i64>,
	expires_at: Option<i64>,
	access_token: &str,
) -> Result<OffsetDateTime, ExchangeError> {
	if let Some(seconds) = expires_in {
		if seconds <= 0 {
			return Err(ExchangeError::NonPositiveExpiresIn);
		}

		return issued_at
			.checked_add(Duration::seconds(seconds))
			.ok_or(ExchangeError::ExpiryOutOfRange);
	}
	if let Some(timestamp) = expires_at {
		return OffsetDateTime::from_unix_timestamp(timestamp)
			.map_err(|_| ExchangeError::ExpiryOutOfRange);
	}

	claims::jwt_expiry(access_token).ok_or(ExchangeError::MissingExpiry)
}
