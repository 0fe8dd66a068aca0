//! Demonstrates a persisted session with the default reqwest transport: the credential lives in
//! a JSON file, expires, and is renewed transparently on the next call.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use auth_gateway::{
	auth::Credential,
	config::GatewayConfig,
	gateway::Gateway,
	http::{ReqwestTransport, RequestSpec},
	reqwest::Client,
	store::{CredentialStore, FileStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).header("content-type", "application/json").body(
				r#"{"code":0,"data":{"accessToken":"demo-access","refreshToken":"demo-refresh","expiresIn":900}}"#,
			);
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/profile").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body(r#"{"name":"demo"}"#);
		})
		.await;
	let path = std::env::temp_dir().join("auth-gateway-demo-session.json");
	let store = FileStore::open(&path)?;

	store.set(Credential::new(
		"expired-access",
		"initial-refresh",
		OffsetDateTime::now_utc() - Duration::minutes(1),
	))?;

	let config = GatewayConfig::builder(Url::parse(&server.url("/api/"))?)
		.refresh_endpoint(Url::parse(&server.url("/api/auth/refresh"))?)
		.response_pointer("/data")
		.allow_insecure(true)
		.build()?;
	let http_client = ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(std::time::Duration::from_secs(10))
			.build()?,
	);
	let gateway = Gateway::with_transport(config, Arc::new(http_client), Arc::new(store))?
		.with_session_hook(|reason: &str| eprintln!("Please sign in again: {reason}."));
	let response = gateway.send(RequestSpec::get("profile")).await?;

	println!("Profile: {}.", String::from_utf8_lossy(response.body()));
	println!("Session persisted at {}.", path.display());

	refresh_mock.assert_async().await;
	profile_mock.assert_async().await;

	gateway.sign_out()?;

	Ok(())
}
