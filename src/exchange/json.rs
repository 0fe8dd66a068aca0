//! JSON refresh exchange for admin backends that accept `{"refreshToken": "..."}`.

// crates.io
use oauth2::http::{
	HeaderValue, Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::RefreshEndpoint,
	exchange::{self, ExchangeError, ExchangeFuture, ExchangeGrant, RefreshExchange},
	http::{self, Transport},
};

#[derive(Deserialize)]
struct JsonGrant {
	#[serde(alias = "accessToken")]
	access_token: String,
	#[serde(default, alias = "refreshToken")]
	refresh_token: Option<String>,
	#[serde(default, alias = "expiresIn")]
	expires_in: Option<i64>,
	#[serde(default, alias = "expiresAt")]
	expires_at: Option<i64>,
}

/// `POST`s the refresh token as a JSON object and reads the renewed tokens back.
///
/// Response fields are accepted in camelCase or snake_case. Backends that wrap the
/// payload (`{"code": 0, "data": {...}}`) are supported through a JSON pointer.
#[derive(Clone, Debug)]
pub struct JsonRefreshExchange {
	url: Url,
	token_field: String,
	response_pointer: String,
}
impl JsonRefreshExchange {
	/// Creates an exchange posting `{"refreshToken": ...}` to `url`.
	pub fn new(url: Url) -> Self {
		Self { url, token_field: "refreshToken".into(), response_pointer: String::new() }
	}

	/// Builds the exchange from a validated endpoint configuration.
	pub fn from_endpoint(endpoint: &RefreshEndpoint) -> Self {
		Self::new(endpoint.url.clone())
			.token_field(endpoint.token_field.clone())
			.response_pointer(endpoint.response_pointer.clone())
	}

	/// Overrides the request field carrying the refresh token.
	pub fn token_field(mut self, field: impl Into<String>) -> Self {
		self.token_field = field.into();

		self
	}

	/// Selects the token payload inside the response envelope (for example `/data`).
	pub fn response_pointer(mut self, pointer: impl Into<String>) -> Self {
		self.response_pointer = pointer.into();

		self
	}

	fn build_request(&self, refresh_token: &TokenSecret) -> Result<HttpRequest, ExchangeError> {
		let mut payload = Map::new();

		payload.insert(self.token_field.clone(), Value::String(refresh_token.expose().to_owned()));

		let body = serde_json::to_vec(&payload)
			.map_err(|e| ExchangeError::Request { message: e.to_string() })?;

		Request::builder()
			.method(Method::POST)
			.uri(self.url.as_str())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.body(body)
			.map_err(|e| ExchangeError::Request { message: e.to_string() })
	}

	fn parse_response(
		&self,
		response: HttpResponse,
		issued_at: OffsetDateTime,
	) -> Result<ExchangeGrant, ExchangeError> {
		let status = response.status();

		if !status.is_success() {
			return Err(ExchangeError::Rejected {
				status: Some(status.as_u16()),
				reason: http::body_preview(response.body()),
			});
		}

		let malformed = |source: serde_path_to_error::Error<serde_json::Error>| {
			ExchangeError::MalformedResponse { source, status: Some(status.as_u16()) }
		};
		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let document: Value =
			serde_path_to_error::deserialize(&mut deserializer).map_err(malformed)?;
		let payload = if self.response_pointer.is_empty() {
			document
		} else {
			document
				.pointer(&self.response_pointer)
				.cloned()
				.ok_or_else(|| ExchangeError::MissingEnvelope {
					pointer: self.response_pointer.clone(),
				})?
		};
		let grant: JsonGrant = serde_path_to_error::deserialize(payload).map_err(malformed)?;

		if grant.access_token.is_empty() {
			return Err(ExchangeError::EmptyAccessToken);
		}

		let expires_at = exchange::resolve_expiry(
			issued_at,
			grant.expires_in,
			grant.expires_at,
			&grant.access_token,
		)?;

		Ok(ExchangeGrant {
			access_token: TokenSecret::new(grant.access_token),
			refresh_token: grant.refresh_token.filter(|t| !t.is_empty()).map(TokenSecret::new),
			expires_at,
		})
	}
}
impl RefreshExchange for JsonRefreshExchange {
	fn exchange<'a>(
		&'a self,
		transport: &'a dyn Transport,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let request = self.build_request(refresh_token)?;
			let issued_at = OffsetDateTime::now_utc();
			let response = transport.call(request).await?;

			self.parse_response(response, issued_at)
		})
	}
}
