//! Best-effort JWT claim inspection for backends that only return a bare access token.
//!
//! Signatures are never verified here; the value is used solely to schedule refreshes.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Number;
// self
use crate::_prelude::*;

#[derive(Deserialize)]
struct ExpiryClaim {
	exp: Number,
}

/// Reads the `exp` claim of a compact JWT and converts it into an absolute instant.
///
/// Returns `None` for opaque tokens, malformed segments, or out-of-range timestamps.
pub fn jwt_expiry(token: &str) -> Option<OffsetDateTime> {
	let mut segments = token.split('.');
	let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);

	if segments.next().is_some() {
		return None;
	}

	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
	// Fractional seconds are truncated.
	let exp = claim.exp.as_i64().or_else(|| claim.exp.as_f64().map(|secs| secs as i64))?;

	OffsetDateTime::from_unix_timestamp(exp).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn encode_jwt(payload: &str) -> String {
		format!(
			"{}.{}.signature",
			URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
			URL_SAFE_NO_PAD.encode(payload),
		)
	}

	#[test]
	fn reads_integer_and_fractional_exp() {
		let token = encode_jwt(r#"{"sub":"admin","exp":1767225600}"#);

		assert_eq!(jwt_expiry(&token), Some(macros::datetime!(2026-01-01 00:00 UTC)));

		let token = encode_jwt(r#"{"exp":1767225600.75}"#);

		assert_eq!(jwt_expiry(&token), Some(macros::datetime!(2026-01-01 00:00 UTC)));
	}

	#[test]
	fn rejects_opaque_and_malformed_tokens() {
		assert_eq!(jwt_expiry("opaque-access-token"), None);
		assert_eq!(jwt_expiry("a.b"), None);
		assert_eq!(jwt_expiry("a.b.c.d"), None);
		assert_eq!(jwt_expiry(&encode_jwt(r#"{"sub":"admin"}"#)), None);
		assert_eq!(jwt_expiry(&encode_jwt("not json")), None);
	}
}
