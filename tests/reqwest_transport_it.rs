#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use auth_gateway::{
	auth::Credential,
	config::{ExchangeFormat, GatewayConfig},
	error::Error,
	gateway::Gateway,
	http::{ReqwestTransport, RequestSpec},
	reqwest::Client,
	store::{CredentialStore, MemoryStore},
	url::Url,
};

fn url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Failed to parse mock server URL.")
}

// The mock server presents a self-signed certificate.
fn gateway(config: GatewayConfig, store: &MemoryStore) -> Gateway {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build reqwest client for the mock server.");

	Gateway::with_transport(
		config,
		Arc::new(ReqwestTransport::with_client(client)),
		Arc::new(store.clone()),
	)
	.expect("Gateway should build.")
}

fn expired_store() -> MemoryStore {
	MemoryStore::with_credential(Credential::new(
		"access-old",
		"refresh-old",
		OffsetDateTime::now_utc() - Duration::minutes(5),
	))
}

#[tokio::test]
async fn json_refresh_then_authorized_call() {
	let server = MockServer::start_async().await;
	let config = GatewayConfig::builder(url(&server, "/api/"))
		.refresh_endpoint(url(&server, "/api/auth/refresh"))
		.response_pointer("/data")
		.allow_insecure(true)
		.build()
		.expect("Configuration should validate.");
	let store = expired_store();
	let gateway = gateway(config, &store);
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/refresh")
				.json_body(serde_json::json!({ "refreshToken": "refresh-old" }));
			then.status(200).header("content-type", "application/json").body(
				r#"{"code":0,"data":{"accessToken":"access-new","refreshToken":"refresh-new","expiresIn":1800}}"#,
			);
		})
		.await;
	let articles = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/articles")
				.query_param("page", "2")
				.header("authorization", "Bearer access-new");
			then.status(200).header("content-type", "application/json").body(r#"{"items":[]}"#);
		})
		.await;
	let response = gateway
		.send(RequestSpec::get("articles?page=2"))
		.await
		.expect("Authorized call should succeed after the refresh.");

	assert_eq!(response.status(), 200);
	assert_eq!(response.body().as_slice(), br#"{"items":[]}"#);

	refresh.assert_async().await;
	articles.assert_async().await;

	let stored = store
		.get()
		.expect("Memory store should be readable.")
		.expect("Renewed credential should be stored.");

	assert_eq!(stored.access_token.expose(), "access-new");
	assert_eq!(stored.refresh_token.expose(), "refresh-new");
}

#[tokio::test]
async fn oauth2_refresh_uses_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let config = GatewayConfig::builder(url(&server, "/api/"))
		.refresh_endpoint(url(&server, "/oauth/token"))
		.exchange_format(ExchangeFormat::OAuth2)
		.client_id("admin-console")
		.allow_insecure(true)
		.build()
		.expect("Configuration should validate.");
	let store = expired_store();
	let gateway = gateway(config, &store);
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-old");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"access-oauth","token_type":"bearer","expires_in":600}"#,
			);
		})
		.await;
	let credential = gateway.ensure_valid().await.expect("OAuth2 refresh should succeed.");

	token.assert_async().await;

	assert_eq!(credential.access_token.expose(), "access-oauth");
	assert_eq!(credential.refresh_token.expose(), "refresh-old");
	assert!(credential.expires_at > OffsetDateTime::now_utc() + Duration::minutes(9));
}

#[tokio::test]
async fn rejected_refresh_clears_the_session() {
	let server = MockServer::start_async().await;
	let config = GatewayConfig::builder(url(&server, "/api/"))
		.refresh_endpoint(url(&server, "/api/auth/refresh"))
		.allow_insecure(true)
		.build()
		.expect("Configuration should validate.");
	let store = expired_store();
	let gateway = gateway(config, &store);
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"msg":"refresh token expired"}"#);
		})
		.await;
	let err = gateway
		.send(RequestSpec::delete("articles/7"))
		.await
		.expect_err("A rejected refresh must fail the call.");

	refresh.assert_async().await;

	assert!(
		matches!(&err, Error::AuthExpired { reason } if reason.contains("refresh token expired"))
	);
	assert_eq!(store.get().expect("Memory store should be readable."), None);
}
