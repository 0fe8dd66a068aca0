//! Request signing contracts that attach the session credential to outbound requests.

// crates.io
use oauth2::http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION};
// self
use crate::{_prelude::*, auth::Credential};

/// Describes how to attach a [`Credential`] to an outbound request.
///
/// The signer only writes headers; it never sees the body or performs I/O, so the
/// dispatcher can sign replays from inside the refresh coordinator.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Inserts authorization state derived from `credential` into `headers`.
	fn sign(&self, headers: &mut HeaderMap, credential: &Credential) -> Result<()>;
}

/// Writes the access token into a single header, optionally prefixed by a scheme.
///
/// The default produces `Authorization: Bearer <token>`. Backends that expect a bare token
/// in a custom header (for example `token: <token>`) use [`HeaderSigner::new`] without a
/// scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderSigner {
	name: HeaderName,
	scheme: Option<String>,
}
impl HeaderSigner {
	/// Creates a signer writing to `name` with an optional scheme prefix.
	pub fn new(name: HeaderName, scheme: Option<String>) -> Self {
		Self { name, scheme: scheme.filter(|value| !value.is_empty()) }
	}

	/// `Authorization: Bearer <token>`.
	pub fn bearer() -> Self {
		Self::new(AUTHORIZATION, Some("Bearer".into()))
	}

	/// Header the signer writes.
	pub fn header_name(&self) -> &HeaderName {
		&self.name
	}
}
impl Default for HeaderSigner {
	fn default() -> Self {
		Self::bearer()
	}
}
impl RequestSigner for HeaderSigner {
	fn sign(&self, headers: &mut HeaderMap, credential: &Credential) -> Result<()> {
		let token = credential.access_token.expose();
		let raw = match &self.scheme {
			Some(scheme) => format!("{scheme} {token}"),
			None => token.to_owned(),
		};
		let mut value = HeaderValue::from_str(&raw).map_err(|_| {
			Error::invalid_request("access token contains characters not allowed in a header")
		})?;

		value.set_sensitive(true);
		headers.insert(self.name.clone(), value);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn credential(access: &str) -> Credential {
		Credential::new(access, "refresh", OffsetDateTime::now_utc() + Duration::hours(1))
	}

	#[test]
	fn bearer_signer_writes_authorization() {
		let mut headers = HeaderMap::new();

		HeaderSigner::default()
			.sign(&mut headers, &credential("access-1"))
			.expect("Bearer signing should succeed.");

		assert_eq!(headers[AUTHORIZATION], "Bearer access-1");
		assert!(headers[AUTHORIZATION].is_sensitive());
	}

	#[test]
	fn custom_header_without_scheme_carries_bare_token() {
		let mut headers = HeaderMap::new();
		let signer = HeaderSigner::new(HeaderName::from_static("token"), Some(String::new()));

		signer.sign(&mut headers, &credential("access-2")).expect("Custom signing should succeed.");

		assert_eq!(headers["token"], "access-2");
		assert!(!headers.contains_key(AUTHORIZATION));
	}

	#[test]
	fn control_characters_are_rejected() {
		let mut headers = HeaderMap::new();
		let err = HeaderSigner::default()
			.sign(&mut headers, &credential("bad\ntoken"))
			.expect_err("Newlines cannot travel in headers.");

		assert!(matches!(err, Error::RequestError { status: None, .. }));
	}
}
