//! RFC 6749 refresh exchange built on the `oauth2` crate.
//!
//! The `oauth2` client drives the request through an [`AsyncHttpClient`] adapter over the
//! gateway's [`Transport`], so refreshes share the same HTTP stack (and test doubles) as
//! API calls. The adapter records the HTTP status of the last response so error mapping
//! can report it.

// crates.io
use oauth2::{
	AsyncHttpClient, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::RefreshEndpoint,
	error::TransportError,
	exchange::{self, ExchangeError, ExchangeFuture, ExchangeGrant, RefreshExchange},
	http::Transport,
};

// Only the token endpoint is configured; refreshes never touch the others.
type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Issues `grant_type=refresh_token` requests against an OAuth 2.0 token endpoint.
#[derive(Clone, Debug)]
pub struct OAuth2RefreshExchange {
	oauth_client: ConfiguredBasicClient,
}
impl OAuth2RefreshExchange {
	/// Creates a public-client exchange for `token_url`.
	pub fn new(token_url: Url, client_id: impl Into<String>) -> Self {
		let oauth_client = BasicClient::new(ClientId::new(client_id.into()))
			.set_token_uri(TokenUrl::from_url(token_url));

		Self { oauth_client }
	}

	/// Authenticates the client with a secret (HTTP Basic).
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.oauth_client = self.oauth_client.set_client_secret(ClientSecret::new(secret.into()));

		self
	}

	/// Builds the exchange from a validated endpoint configuration.
	pub fn from_endpoint(endpoint: &RefreshEndpoint) -> Self {
		let exchange =
			Self::new(endpoint.url.clone(), endpoint.client_id.clone().unwrap_or_default());

		match &endpoint.client_secret {
			Some(secret) => exchange.client_secret(secret.clone()),
			None => exchange,
		}
	}
}
impl RefreshExchange for OAuth2RefreshExchange {
	fn exchange<'a>(
		&'a self,
		transport: &'a dyn Transport,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let client = TransportClient { transport, status: StatusSlot::default() };
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let issued_at = OffsetDateTime::now_utc();
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&client)
				.await
				.map_err(|err| map_request_error(err, client.status.get()))?;

			map_token_response(response, issued_at)
		})
	}
}

#[derive(Clone, Debug, Default)]
struct StatusSlot(Arc<Mutex<Option<u16>>>);
impl StatusSlot {
	fn store(&self, status: u16) {
		*self.0.lock() = Some(status);
	}

	fn get(&self) -> Option<u16> {
		*self.0.lock()
	}
}

struct TransportClient<'t> {
	transport: &'t dyn Transport,
	status: StatusSlot,
}
impl<'c> AsyncHttpClient<'c> for TransportClient<'_> {
	type Error = HttpClientError<TransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let call = self.transport.call(request);
		let status = self.status.clone();

		Box::pin(async move {
			let response = call.await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))?;

			status.store(response.status().as_u16());

			Ok(response)
		})
	}
}

fn map_token_response(
	response: BasicTokenResponse,
	issued_at: OffsetDateTime,
) -> Result<ExchangeGrant, ExchangeError> {
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(ExchangeError::EmptyAccessToken);
	}

	let expires_in = response
		.expires_in()
		.map(|delta| i64::try_from(delta.as_secs()).map_err(|_| ExchangeError::ExpiryOutOfRange))
		.transpose()?;
	let expires_at = exchange::resolve_expiry(issued_at, expires_in, None, access_token)?;

	Ok(ExchangeGrant {
		access_token: TokenSecret::new(access_token.clone()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().clone())),
		expires_at,
	})
}

fn map_request_error(
	err: BasicRequestTokenError<HttpClientError<TransportError>>,
	status: Option<u16>,
) -> ExchangeError {
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, status),
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(source, _body) =>
			ExchangeError::MalformedResponse { source, status },
		RequestTokenError::Other(message) => ExchangeError::Rejected {
			status,
			reason: format!("token endpoint returned an unexpected response: {message}"),
		},
	}
}

fn map_server_response(response: BasicErrorResponse, status: Option<u16>) -> ExchangeError {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	ExchangeError::Rejected { status, reason }
}

fn map_transport_error(err: HttpClientError<TransportError>) -> ExchangeError {
	match err {
		HttpClientError::Reqwest(inner) => ExchangeError::Transport(*inner),
		HttpClientError::Io(inner) => ExchangeError::Transport(TransportError::Io(inner)),
		HttpClientError::Http(inner) => ExchangeError::Request { message: inner.to_string() },
		HttpClientError::Other(message) => ExchangeError::Request { message },
		_ => ExchangeError::Request { message: "unknown HTTP client failure".into() },
	}
}
