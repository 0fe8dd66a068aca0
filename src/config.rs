//! Gateway configuration: endpoints, refresh exchange format, expiry leeway, and the
//! authorization header layout.
//!
//! Configurations are assembled with [`GatewayConfig::builder`] or loaded from JSON via
//! [`GatewayConfig::from_json_str`] / [`GatewayConfig::from_path`]. Both paths normalize the
//! base URL and run the same validation.

// std
use std::{fs, path::Path};
// crates.io
use oauth2::http::HeaderName;
// self
use crate::{_prelude::*, error::ConfigError, ext::HeaderSigner};

/// Wire format of the refresh exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeFormat {
	/// JSON body carrying the refresh token; the common admin-backend layout.
	#[default]
	#[serde(rename = "json")]
	Json,
	/// RFC 6749 `grant_type=refresh_token` form request.
	#[serde(rename = "oauth2")]
	OAuth2,
}

/// Refresh exchange endpoint settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshEndpoint {
	/// Endpoint that trades a refresh token for a new access token.
	pub url: Url,
	/// Wire format of the exchange.
	#[serde(default)]
	pub format: ExchangeFormat,
	/// JSON field carrying the refresh token (JSON format only).
	#[serde(default = "default_token_field")]
	pub token_field: String,
	/// JSON pointer selecting the token payload inside a response envelope (e.g. `/data`).
	#[serde(default)]
	pub response_pointer: String,
	/// OAuth 2.0 client identifier (OAuth2 format only).
	#[serde(default)]
	pub client_id: Option<String>,
	/// OAuth 2.0 client secret for confidential clients (OAuth2 format only).
	#[serde(default)]
	pub client_secret: Option<String>,
}
impl Debug for RefreshEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshEndpoint")
			.field("url", &self.url.as_str())
			.field("format", &self.format)
			.field("token_field", &self.token_field)
			.field("response_pointer", &self.response_pointer)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.finish()
	}
}

/// Layout of the header carrying the access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationHeader {
	/// Header name.
	pub header: String,
	/// Scheme prefix; `None` sends the bare token.
	pub scheme: Option<String>,
}
impl Default for AuthorizationHeader {
	fn default() -> Self {
		Self { header: "authorization".into(), scheme: Some("Bearer".into()) }
	}
}

/// Validated gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Root that relative request targets are resolved against; always ends with `/`.
	pub base_url: Url,
	/// Refresh exchange settings.
	pub refresh: RefreshEndpoint,
	/// Credentials expiring within this window are refreshed before use.
	#[serde(default = "default_expiry_leeway", with = "seconds")]
	pub expiry_leeway: Duration,
	/// Per-request timeout applied by the built-in reqwest transport.
	#[serde(default, with = "optional_seconds")]
	pub request_timeout: Option<Duration>,
	/// Header layout for the access token.
	#[serde(default)]
	pub authorization: AuthorizationHeader,
	/// Permits `http://` endpoints (local development and tests).
	#[serde(default)]
	pub allow_insecure: bool,
}
impl GatewayConfig {
	/// Default expiry leeway.
	pub const DEFAULT_EXPIRY_LEEWAY: Duration = Duration::seconds(30);
	/// Largest accepted expiry leeway.
	pub const MAX_EXPIRY_LEEWAY: Duration = Duration::days(1);

	/// Creates a new builder for the provided API root.
	pub fn builder(base_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)?;

		config.normalized().validated()
	}

	/// Reads, parses, and validates a JSON configuration file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = fs::read_to_string(path)?;

		Self::from_json_str(&raw)
	}

	/// Builds the signer described by [`GatewayConfig::authorization`].
	pub fn signer(&self) -> Result<HeaderSigner, ConfigError> {
		let name = parse_header_name(&self.authorization.header)?;

		Ok(HeaderSigner::new(name, self.authorization.scheme.clone()))
	}

	fn normalized(mut self) -> Self {
		if !self.base_url.path().ends_with('/') {
			let path = format!("{}/", self.base_url.path());

			self.base_url.set_path(&path);
		}

		self
	}

	fn validated(self) -> Result<Self, ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeBase { url: self.base_url.to_string() });
		}
		if !self.allow_insecure {
			validate_endpoint("base", &self.base_url)?;
			validate_endpoint("refresh", &self.refresh.url)?;
		}
		if self.refresh.format == ExchangeFormat::OAuth2
			&& self.refresh.client_id.as_deref().is_none_or(str::is_empty)
		{
			return Err(ConfigError::MissingClientId);
		}
		if self.refresh.token_field.is_empty() {
			return Err(ConfigError::EmptyTokenField);
		}
		if !self.refresh.response_pointer.is_empty()
			&& !self.refresh.response_pointer.starts_with('/')
		{
			return Err(ConfigError::InvalidResponsePointer {
				pointer: self.refresh.response_pointer.clone(),
			});
		}
		if self.expiry_leeway.is_negative() {
			return Err(ConfigError::NegativeLeeway);
		}
		if self.expiry_leeway > Self::MAX_EXPIRY_LEEWAY {
			return Err(ConfigError::ExcessiveLeeway { max: Self::MAX_EXPIRY_LEEWAY });
		}
		if self.request_timeout.is_some_and(|timeout| !timeout.is_positive()) {
			return Err(ConfigError::NonPositiveTimeout);
		}

		parse_header_name(&self.authorization.header)?;

		Ok(self)
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	base_url: Url,
	refresh_url: Option<Url>,
	format: ExchangeFormat,
	token_field: String,
	response_pointer: String,
	client_id: Option<String>,
	client_secret: Option<String>,
	expiry_leeway: Duration,
	request_timeout: Option<Duration>,
	authorization: AuthorizationHeader,
	allow_insecure: bool,
}
impl GatewayConfigBuilder {
	/// Creates a builder seeded with the API root.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_url: None,
			format: ExchangeFormat::default(),
			token_field: default_token_field(),
			response_pointer: String::new(),
			client_id: None,
			client_secret: None,
			expiry_leeway: GatewayConfig::DEFAULT_EXPIRY_LEEWAY,
			request_timeout: None,
			authorization: AuthorizationHeader::default(),
			allow_insecure: false,
		}
	}

	/// Sets the refresh exchange endpoint.
	pub fn refresh_endpoint(mut self, url: Url) -> Self {
		self.refresh_url = Some(url);

		self
	}

	/// Selects the refresh exchange wire format.
	pub fn exchange_format(mut self, format: ExchangeFormat) -> Self {
		self.format = format;

		self
	}

	/// Overrides the JSON field carrying the refresh token.
	pub fn token_field(mut self, field: impl Into<String>) -> Self {
		self.token_field = field.into();

		self
	}

	/// Selects the token payload inside a response envelope.
	pub fn response_pointer(mut self, pointer: impl Into<String>) -> Self {
		self.response_pointer = pointer.into();

		self
	}

	/// Sets the OAuth 2.0 client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth 2.0 client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Overrides the expiry leeway (defaults to 30 seconds).
	pub fn expiry_leeway(mut self, leeway: Duration) -> Self {
		self.expiry_leeway = leeway;

		self
	}

	/// Sets the per-request timeout of the built-in transport.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the header carrying the access token.
	pub fn authorization_header(
		mut self,
		header: impl Into<String>,
		scheme: Option<String>,
	) -> Self {
		self.authorization = AuthorizationHeader { header: header.into(), scheme };

		self
	}

	/// Permits `http://` endpoints.
	pub fn allow_insecure(mut self, allow: bool) -> Self {
		self.allow_insecure = allow;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		let url = self.refresh_url.ok_or(ConfigError::MissingRefreshEndpoint)?;
		let config = GatewayConfig {
			base_url: self.base_url,
			refresh: RefreshEndpoint {
				url,
				format: self.format,
				token_field: self.token_field,
				response_pointer: self.response_pointer,
				client_id: self.client_id,
				client_secret: self.client_secret,
			},
			expiry_leeway: self.expiry_leeway,
			request_timeout: self.request_timeout,
			authorization: self.authorization,
			allow_insecure: self.allow_insecure,
		};

		config.normalized().validated()
	}
}

mod seconds {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

mod optional_seconds {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(duration) => serializer.serialize_some(&duration.whole_seconds()),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::seconds))
	}
}

fn default_token_field() -> String {
	"refreshToken".into()
}

fn default_expiry_leeway() -> Duration {
	GatewayConfig::DEFAULT_EXPIRY_LEEWAY
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
	HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
		.map_err(|_| ConfigError::InvalidHeaderName { name: name.to_owned() })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse configuration fixture URL.")
	}

	#[test]
	fn builder_normalizes_base_and_applies_defaults() {
		let config = GatewayConfig::builder(url("https://admin.example.com/api"))
			.refresh_endpoint(url("https://admin.example.com/api/auth/refresh"))
			.build()
			.expect("Secure configuration should validate.");

		assert_eq!(config.base_url.as_str(), "https://admin.example.com/api/");
		assert_eq!(config.refresh.format, ExchangeFormat::Json);
		assert_eq!(config.refresh.token_field, "refreshToken");
		assert_eq!(config.expiry_leeway, Duration::seconds(30));
		assert_eq!(config.request_timeout, None);
		assert_eq!(config.authorization, AuthorizationHeader::default());
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		let base = || GatewayConfig::builder(url("https://admin.example.com/"));

		assert!(matches!(base().build(), Err(ConfigError::MissingRefreshEndpoint)));
		assert!(matches!(
			base().refresh_endpoint(url("http://admin.example.com/refresh")).build(),
			Err(ConfigError::InsecureEndpoint { endpoint: "refresh", .. })
		));
		assert!(matches!(
			base()
				.refresh_endpoint(url("https://admin.example.com/oauth/token"))
				.exchange_format(ExchangeFormat::OAuth2)
				.build(),
			Err(ConfigError::MissingClientId)
		));
		assert!(matches!(
			base()
				.refresh_endpoint(url("https://admin.example.com/refresh"))
				.expiry_leeway(Duration::seconds(-1))
				.build(),
			Err(ConfigError::NegativeLeeway)
		));
		assert!(matches!(
			base()
				.refresh_endpoint(url("https://admin.example.com/refresh"))
				.expiry_leeway(Duration::days(2))
				.build(),
			Err(ConfigError::ExcessiveLeeway { .. })
		));
		assert!(matches!(
			base()
				.refresh_endpoint(url("https://admin.example.com/refresh"))
				.authorization_header("bad header", None)
				.build(),
			Err(ConfigError::InvalidHeaderName { .. })
		));
		assert!(matches!(
			base()
				.refresh_endpoint(url("https://admin.example.com/refresh"))
				.response_pointer("data")
				.build(),
			Err(ConfigError::InvalidResponsePointer { .. })
		));
	}

	#[test]
	fn insecure_endpoints_are_allowed_on_request() {
		let config = GatewayConfig::builder(url("http://127.0.0.1:8080"))
			.refresh_endpoint(url("http://127.0.0.1:8080/auth/refresh"))
			.allow_insecure(true)
			.build()
			.expect("Insecure endpoints should be accepted when allowed.");

		assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/");
	}

	#[test]
	fn json_documents_round_trip_through_validation() {
		let config = GatewayConfig::from_json_str(
			r#"{
				"base_url": "https://admin.example.com/v1",
				"refresh": {
					"url": "https://admin.example.com/v1/oauth/token",
					"format": "oauth2",
					"client_id": "dashboard"
				},
				"expiry_leeway": 90,
				"request_timeout": 15,
				"authorization": { "header": "Token", "scheme": null }
			}"#,
		)
		.expect("JSON configuration should parse and validate.");

		assert_eq!(config.base_url.as_str(), "https://admin.example.com/v1/");
		assert_eq!(config.refresh.format, ExchangeFormat::OAuth2);
		assert_eq!(config.expiry_leeway, Duration::seconds(90));
		assert_eq!(config.request_timeout, Some(Duration::seconds(15)));

		let signer = config.signer().expect("Configured header should produce a signer.");

		assert_eq!(signer.header_name().as_str(), "token");

		let rendered = serde_json::to_string(&config).expect("Configuration should serialize.");
		let reparsed =
			GatewayConfig::from_json_str(&rendered).expect("Serialized configuration should parse.");

		assert_eq!(reparsed, config);
	}

	#[test]
	fn huge_leeway_from_json_is_rejected() {
		let err = GatewayConfig::from_json_str(
			r#"{
				"base_url": "https://admin.example.com/",
				"refresh": { "url": "https://admin.example.com/auth/refresh" },
				"expiry_leeway": 9223372036854775807
			}"#,
		)
		.expect_err("Leeways beyond a day must be rejected.");

		assert!(matches!(err, ConfigError::ExcessiveLeeway { .. }));
	}

	#[test]
	fn json_errors_report_the_failing_path() {
		let err = GatewayConfig::from_json_str(
			r#"{ "base_url": "https://admin.example.com/", "refresh": { "url": 42 } }"#,
		)
		.expect_err("Numeric URLs must be rejected.");

		match err {
			ConfigError::Parse(inner) => assert_eq!(inner.path().to_string(), "refresh.url"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn debug_hides_client_secret() {
		let config = GatewayConfig::builder(url("https://admin.example.com/"))
			.refresh_endpoint(url("https://admin.example.com/oauth/token"))
			.exchange_format(ExchangeFormat::OAuth2)
			.client_id("dashboard")
			.client_secret("very-secret")
			.build()
			.expect("Confidential OAuth2 configuration should validate.");

		assert!(!format!("{config:?}").contains("very-secret"));
	}
}
