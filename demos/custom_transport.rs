//! Demonstrates driving the gateway through a caller-supplied transport.
//!
//! 1. Implement [`Transport`] so every call resolves to an [`HttpResponse`] (or a
//!    [`TransportError`] when no response exists).
//! 2. Pass it to [`Gateway::with_transport`] together with a credential store.
//! 3. Fire concurrent calls with an expired credential and observe a single refresh exchange
//!    followed by the queued calls in order.
//! 4. Revoke the refresh token and watch the session hook fire exactly once.

// std
use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
// self
use auth_gateway::{
	auth::Credential,
	config::GatewayConfig,
	error::{Error, TransportError},
	gateway::Gateway,
	http::{RequestSpec, Transport, TransportFuture},
	http_types::{Request, Response, StatusCode, header::AUTHORIZATION},
	store::MemoryStore,
	url::Url,
};

type HttpResponse = Response<Vec<u8>>;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let transport = Arc::new(InProcessBackend::default());
	let store = MemoryStore::with_credential(Credential::new(
		"access-1",
		"refresh-1",
		OffsetDateTime::now_utc() - Duration::seconds(1),
	));
	let config = GatewayConfig::builder(Url::parse("https://admin.example.com/api/")?)
		.refresh_endpoint(Url::parse("https://admin.example.com/api/auth/refresh")?)
		.response_pointer("/data")
		.build()?;
	let gateway = Gateway::with_transport(config, transport.clone(), Arc::new(store))?
		.with_session_hook(|reason: &str| println!("Session hook fired: {reason}."));
	let (users, articles, stats) = tokio::join!(
		gateway.send(RequestSpec::get("users")),
		gateway.send(RequestSpec::get("articles?page=1")),
		gateway.send(RequestSpec::get("stats")),
	);

	for response in [users?, articles?, stats?] {
		println!("{} {}", response.status(), String::from_utf8_lossy(response.body()));
	}

	println!(
		"Refresh exchanges performed: {} (calls queued behind it: {}).",
		transport.refreshes.load(Ordering::SeqCst),
		gateway.metrics().queued()
	);

	transport.revoked.store(true, Ordering::SeqCst);
	gateway.sign_in(Credential::new(
		"access-stale",
		"refresh-1",
		OffsetDateTime::now_utc() - Duration::seconds(1),
	))?;

	match gateway.send(RequestSpec::get("users")).await {
		Err(Error::AuthExpired { reason }) => println!("Call rejected, session over: {reason}."),
		other => println!("Unexpected outcome: {other:?}."),
	}

	Ok(())
}

/// Fake admin backend answering refresh and API calls without any network.
#[derive(Debug, Default)]
struct InProcessBackend {
	refreshes: AtomicUsize,
	revoked: AtomicBool,
}
impl InProcessBackend {
	fn refresh(&self) -> HttpResponse {
		if self.revoked.load(Ordering::SeqCst) {
			return json(401, r#"{"msg":"refresh token revoked"}"#.into());
		}

		let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 2;

		json(
			200,
			format!(
				r#"{{"code":0,"data":{{"accessToken":"access-{n}","refreshToken":"refresh-{n}","expiresIn":900}}}}"#
			),
		)
	}

	fn api(&self, path: &str, authorization: Option<&str>) -> HttpResponse {
		match authorization {
			Some(token) if token.starts_with("Bearer access-") && token != "Bearer access-1" =>
				json(200, format!(r#"{{"path":"{path}","token":"{token}"}}"#)),
			_ => json(401, r#"{"msg":"unauthorized"}"#.into()),
		}
	}
}
impl Transport for InProcessBackend {
	fn call(&self, request: Request<Vec<u8>>) -> TransportFuture {
		let path = request.uri().path().to_owned();
		let response = if path == "/api/auth/refresh" {
			Ok(self.refresh())
		} else if path.starts_with("/api/") {
			let authorization = request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());

			Ok(self.api(&path, authorization))
		} else {
			Err(TransportError::Timeout { target: path })
		};

		Box::pin(async move { response })
	}
}

fn json(status: u16, body: String) -> HttpResponse {
	let mut response = Response::new(body.into_bytes());

	*response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

	response
}
