//! Storage contracts and built-in stores for the session credential.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Credential};

/// Persistence contract for the single session credential.
///
/// Calls are synchronous and expected to be cheap: the gateway reads the store on every
/// dispatch while holding its refresh-state lock, so implementations must not block on
/// the network. The gateway is the only writer besides sign-in and sign-out.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored credential, if any.
	fn get(&self) -> Result<Option<Credential>, StoreError>;

	/// Persists or replaces the stored credential.
	fn set(&self, credential: Credential) -> Result<(), StoreError>;

	/// Removes the stored credential.
	fn clear(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_serializes_with_variant_tag() {
		let payload = serde_json::to_string(&StoreError::Backend { message: "disk full".into() })
			.expect("StoreError should serialize to JSON.");

		assert_eq!(payload, "{\"Backend\":{\"message\":\"disk full\"}}");
		assert_eq!(
			StoreError::Backend { message: "disk full".into() }.to_string(),
			"Backend failure: disk full."
		);
	}
}
