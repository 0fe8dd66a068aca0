//! Session credential model, validity checks, and builders.

// self
use crate::{
	_prelude::*,
	auth::{claims, secret::TokenSecret},
};

/// Lifecycle status for a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// The access token may be attached to requests.
	Active,
	/// The access token reached its expiry instant and must be refreshed before use.
	Expired,
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry was configured and none could be read from the access token.
	#[error("Expiry must be supplied via expires_at, expires_in, or a JWT exp claim.")]
	MissingExpiry,
	/// Issued when `issued_at + expires_in` is not a representable instant.
	#[error("Relative expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Access/refresh token pair with an absolute expiry instant.
///
/// `expires_at` is always absolute; relative lifetimes are converted once, when the
/// credential is created, so later checks never re-derive it from a drifting clock.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Access token attached to API calls; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token used only by the refresh exchange.
	pub refresh_token: TokenSecret,
	/// Instant at which the access token stops being valid.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential from raw token values and an absolute expiry.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_at,
		}
	}

	/// Returns a builder for credentials assembled from login or exchange responses.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// Returns `true` while `now` is strictly before the expiry instant.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at > now
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, now: OffsetDateTime) -> CredentialStatus {
		if self.is_valid_at(now) { CredentialStatus::Active } else { CredentialStatus::Expired }
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> CredentialStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Time left before expiry; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}

	/// Log-safe fingerprint of the access token.
	pub fn fingerprint(&self) -> String {
		self.access_token.fingerprint()
	}

	/// Returns `true` when both credentials carry the same access token.
	pub fn same_access_token(&self, other: &Credential) -> bool {
		self.access_token == other.access_token
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Validity check applied before every outbound call.
///
/// Absent credentials are invalid, and so is any credential whose expiry is at or before
/// `now`. Invalid means "refresh before use"; expiry alone never ends a session.
pub fn is_valid(credential: Option<&Credential>, now: OffsetDateTime) -> bool {
	credential.is_some_and(|credential| credential.is_valid_at(now))
}

/// Builder for [`Credential`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Reuses an existing refresh secret.
	pub fn refresh_secret(mut self, secret: TokenSecret) -> Self {
		self.refresh_token = Some(secret);

		self
	}

	/// Sets the instant the relative lifetime is measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative lifetime measured from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	///
	/// Expiry precedence: `expires_at`, then `issued_at + expires_in`, then the `exp`
	/// claim of a JWT access token.
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(CredentialBuilderError::MissingRefreshToken)?;
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => self
				.issued_at
				.unwrap_or_else(OffsetDateTime::now_utc)
				.checked_add(delta)
				.ok_or(CredentialBuilderError::ExpiryOutOfRange)?,
			(None, None) => claims::jwt_expiry(access_token.expose())
				.ok_or(CredentialBuilderError::MissingExpiry)?,
		};

		Ok(Credential { access_token, refresh_token, expires_at })
	}
}
