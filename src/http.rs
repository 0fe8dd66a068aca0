//! Transport primitives and request descriptions for authorized calls.
//!
//! The module exposes [`Transport`], the gateway's only dependency on an HTTP stack, and
//! [`RequestSpec`], the caller-facing description of a call. Requests and responses use the
//! `http` crate types re-exported by `oauth2` ([`HttpRequest`], [`HttpResponse`]) with
//! in-memory bodies; the gateway never streams.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue, Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`Transport::call`].
pub type TransportFuture =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'static + Send + Sync>>;

/// Abstraction over HTTP stacks capable of executing one request.
///
/// Implementations perform exactly one network call per invocation and never retry.
/// Any HTTP status (including 4xx/5xx) is a successful transport outcome; only the
/// absence of a response is a [`TransportError`]. The returned future must own whatever
/// it needs so it stays `'static + Send + Sync`: the gateway may hand it to another task, and
/// the `oauth2` refresh exchange requires `Sync` futures.
///
/// The request is considered dispatched when `call` returns; queued requests are handed
/// to `call` in FIFO order.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and resolves with the raw response.
	fn call(&self, request: HttpRequest) -> TransportFuture;
}

/// Caller-facing description of an authorized request.
///
/// `target` is either a path resolved against the configured base URL (`users/42`,
/// `/api/articles`) or an absolute URL. Bodies are opaque bytes.
#[derive(Clone, Debug)]
pub struct RequestSpec {
	/// HTTP method.
	pub method: Method,
	/// Path or absolute URL.
	pub target: String,
	/// Extra headers; the authorization header is added by the gateway.
	pub headers: HeaderMap,
	/// Request payload.
	pub body: Vec<u8>,
}
impl RequestSpec {
	/// Creates a request with an empty body.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self { method, target: target.into(), headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Shorthand for a `GET` request.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// Shorthand for a `POST` request.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `payload` as the JSON body and sets the matching content type.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(payload)?;
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		if !self.headers.contains_key(ACCEPT) {
			self.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		}

		Ok(self)
	}

	/// Resolves the target against `base` and freezes the request for (re)dispatch.
	pub fn prepare(&self, base: &Url) -> Result<PreparedRequest> {
		let url = base.join(&self.target).map_err(|e| {
			Error::invalid_request(format!("target `{}` cannot be resolved: {e}", self.target))
		})?;

		Ok(PreparedRequest {
			method: self.method.clone(),
			url,
			headers: self.headers.clone(),
			body: self.body.clone(),
		})
	}
}

/// Request with a resolved URL, ready to be signed and dispatched any number of times.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Headers supplied by the caller.
	pub headers: HeaderMap,
	/// Request payload.
	pub body: Vec<u8>,
}
impl PreparedRequest {
	/// Builds an [`HttpRequest`] carrying the caller's headers plus `extra` headers.
	pub fn to_http(&self, extra: HeaderMap) -> Result<HttpRequest> {
		let mut request = Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str())
			.body(self.body.clone())
			.map_err(|e| Error::invalid_request(format!("request cannot be built: {e}")))?;
		let headers = request.headers_mut();

		headers.extend(self.headers.clone());
		headers.extend(extra);

		Ok(request)
	}

	/// Short `METHOD url` label for logs.
	pub fn label(&self) -> String {
		format!("{} {}", self.method, self.url)
	}
}

/// Lossy UTF-8 preview of a response body, truncated for error messages.
pub fn body_preview(body: &[u8]) -> String {
	const BODY_PREVIEW_LIMIT: usize = 256;

	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.to_owned();
	}

	let mut buf: String = text.chars().take(BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

/// Thin wrapper around [`ReqwestClient`] implementing [`Transport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the configured request timeout.
	pub fn from_config(
		config: &crate::config::GatewayConfig,
	) -> Result<Self, crate::error::ConfigError> {
		let mut builder = ReqwestClient::builder();

		if let Some(timeout) = config.request_timeout {
			let timeout = std::time::Duration::try_from(timeout)
				.map_err(|_| crate::error::ConfigError::NonPositiveTimeout)?;

			builder = builder.timeout(timeout);
		}

		Ok(Self(builder.build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestTransport(..)")
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn call(&self, request: HttpRequest) -> TransportFuture {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://admin.example.com/api/").expect("Base URL fixture should parse.")
	}

	#[test]
	fn prepare_resolves_relative_and_absolute_targets() {
		let relative = RequestSpec::get("articles/7").prepare(&base()).expect("Relative target.");

		assert_eq!(relative.url.as_str(), "https://admin.example.com/api/articles/7");

		let rooted = RequestSpec::get("/health").prepare(&base()).expect("Rooted target.");

		assert_eq!(rooted.url.as_str(), "https://admin.example.com/health");

		let absolute = RequestSpec::delete("https://cms.example.com/tags/3")
			.prepare(&base())
			.expect("Absolute target.");

		assert_eq!(absolute.url.as_str(), "https://cms.example.com/tags/3");
		assert_eq!(absolute.label(), "DELETE https://cms.example.com/tags/3");
	}

	#[test]
	fn prepare_rejects_unresolvable_targets() {
		let err = RequestSpec::get("http://[::1").prepare(&base()).unwrap_err();

		assert!(matches!(err, Error::RequestError { status: None, .. }));
	}

	#[test]
	fn json_body_sets_headers_and_extra_headers_win() {
		let spec = RequestSpec::post("tenants")
			.json(&serde_json::json!({ "name": "acme" }))
			.expect("JSON payload should serialize.");
		let prepared = spec.prepare(&base()).expect("Target should resolve.");
		let mut extra = HeaderMap::new();

		extra.insert(ACCEPT, HeaderValue::from_static("text/plain"));

		let request = prepared.to_http(extra).expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri(), "https://admin.example.com/api/tenants");
		assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
		assert_eq!(request.headers()[ACCEPT], "text/plain");
		assert_eq!(request.body().as_slice(), br#"{"name":"acme"}"#);
	}

	#[test]
	fn body_preview_truncates_long_payloads() {
		assert_eq!(body_preview(b"  {\"msg\":\"denied\"}\n"), "{\"msg\":\"denied\"}");

		let long = "x".repeat(300);
		let preview = body_preview(long.as_bytes());

		assert_eq!(preview.chars().count(), 257);
		assert!(preview.ends_with('…'));
	}
}
