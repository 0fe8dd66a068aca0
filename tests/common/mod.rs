//! Shared fixtures for gateway integration tests: a scripted in-memory transport that records
//! every call, answers per path, and can hold the refresh exchange open on demand.

#![allow(dead_code)]

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
use tokio::sync::Notify;
// self
use auth_gateway::{
	auth::Credential,
	config::GatewayConfig,
	error::TransportError,
	gateway::Gateway,
	http::{Transport, TransportFuture},
	http_types::{Request, Response, StatusCode, header::AUTHORIZATION},
	store::MemoryStore,
	url::Url,
};

pub const BASE_URL: &str = "https://admin.example.com/api/";
pub const REFRESH_PATH: &str = "/api/auth/refresh";

type Responder =
	Arc<dyn Fn(&RecordedCall) -> Result<Response<Vec<u8>>, TransportError> + Send + Sync>;

/// One request observed by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct RecordedCall {
	pub method: String,
	pub path: String,
	pub authorization: Option<String>,
	pub headers: Vec<(String, String)>,
	pub body: String,
}
impl RecordedCall {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
	}
}

#[derive(Default)]
struct ScriptState {
	calls: Mutex<Vec<RecordedCall>>,
	routes: Mutex<HashMap<String, Responder>>,
	gates: Mutex<HashMap<String, Arc<Notify>>>,
}

/// Transport double; clones share the script and the call log.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
	state: Arc<ScriptState>,
}
impl ScriptedTransport {
	/// Answers requests for `path` with `responder`; unknown paths get 404.
	pub fn route<F>(&self, path: &str, responder: F) -> &Self
	where
		F: 'static + Fn(&RecordedCall) -> Result<Response<Vec<u8>>, TransportError> + Send + Sync,
	{
		self.state.routes.lock().insert(path.to_owned(), Arc::new(responder));

		self
	}

	/// Answers `path` with a fixed JSON body.
	pub fn route_json(&self, path: &str, status: u16, body: &'static str) -> &Self {
		self.route(path, move |_| Ok(json(status, body)))
	}

	/// Holds every subsequent call to `path` until the returned handle is notified, once per
	/// call.
	pub fn gate(&self, path: &str) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());

		self.state.gates.lock().insert(path.to_owned(), gate.clone());

		gate
	}

	/// Lets subsequent calls to `path` through immediately.
	pub fn open(&self, path: &str) {
		self.state.gates.lock().remove(path);
	}

	/// Holds every subsequent refresh exchange until the returned handle is notified.
	pub fn gate_refresh(&self) -> Arc<Notify> {
		self.gate(REFRESH_PATH)
	}

	/// Lets subsequent refresh exchanges through immediately.
	pub fn open_refresh(&self) {
		self.open(REFRESH_PATH);
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.state.calls.lock().clone()
	}

	pub fn paths(&self) -> Vec<String> {
		self.calls().into_iter().map(|call| call.path).collect()
	}

	pub fn refresh_calls(&self) -> usize {
		self.calls().iter().filter(|call| call.path == REFRESH_PATH).count()
	}
}
impl Transport for ScriptedTransport {
	fn call(&self, request: Request<Vec<u8>>) -> TransportFuture {
		let call = RecordedCall {
			method: request.method().to_string(),
			path: request.uri().path().to_owned(),
			authorization: request
				.headers()
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
			headers: request
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect(),
			body: String::from_utf8_lossy(request.body()).into_owned(),
		};

		self.state.calls.lock().push(call.clone());

		let responder = self.state.routes.lock().get(&call.path).cloned();
		let gate = self.state.gates.lock().get(&call.path).cloned();

		Box::pin(async move {
			if let Some(gate) = gate {
				gate.notified().await;
			}

			match responder {
				Some(responder) => responder(&call),
				None => Ok(json(404, r#"{"msg":"no route"}"#)),
			}
		})
	}
}

pub fn json(status: u16, body: &str) -> Response<Vec<u8>> {
	let mut response = Response::new(body.as_bytes().to_vec());

	*response.status_mut() = StatusCode::from_u16(status).expect("Status fixture should be valid.");
	response.headers_mut().insert(
		"content-type",
		"application/json".parse().expect("Content type fixture should parse."),
	);

	response
}

/// Scripts a successful JSON exchange issuing `access` (and optionally a rotated refresh token).
pub fn route_refresh_success(
	transport: &ScriptedTransport,
	access: &'static str,
	refresh: Option<&'static str>,
) {
	transport.route(REFRESH_PATH, move |_| {
		let body = match refresh {
			Some(refresh) => format!(
				r#"{{"data":{{"accessToken":"{access}","refreshToken":"{refresh}","expiresIn":3600}}}}"#
			),
			None => format!(r#"{{"data":{{"accessToken":"{access}","expiresIn":3600}}}}"#),
		};

		Ok(json(200, &body))
	});
}

/// Answers `path` with the authorization header it received.
pub fn route_echo(transport: &ScriptedTransport, path: &str) {
	transport.route(path, |call| {
		let seen = call.authorization.clone().unwrap_or_default();

		Ok(json(200, &format!(r#"{{"authorization":"{seen}"}}"#)))
	});
}

pub fn config() -> GatewayConfig {
	GatewayConfig::builder(Url::parse(BASE_URL).expect("Base URL fixture should parse."))
		.refresh_endpoint(
			Url::parse("https://admin.example.com/api/auth/refresh")
				.expect("Refresh URL fixture should parse."),
		)
		.response_pointer("/data")
		.build()
		.expect("Gateway configuration fixture should validate.")
}

pub fn expired_credential() -> Credential {
	Credential::new("access-old", "refresh-old", OffsetDateTime::now_utc() - Duration::seconds(1))
}

pub fn valid_credential() -> Credential {
	Credential::new("access-valid", "refresh-old", OffsetDateTime::now_utc() + Duration::hours(1))
}

/// Session hook that records every notification.
#[derive(Clone, Default)]
pub struct HookLog(Arc<Mutex<Vec<String>>>);
impl HookLog {
	pub fn reasons(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}

pub fn gateway(transport: &ScriptedTransport, store: &MemoryStore) -> (Gateway, HookLog) {
	gateway_with(config(), transport, store)
}

pub fn gateway_with(
	config: GatewayConfig,
	transport: &ScriptedTransport,
	store: &MemoryStore,
) -> (Gateway, HookLog) {
	let log = HookLog::default();
	let sink = log.clone();
	let gateway =
		Gateway::with_transport(config, Arc::new(transport.clone()), Arc::new(store.clone()))
			.expect("Gateway fixture should build.")
			.with_session_hook(move |reason: &str| sink.0.lock().push(reason.to_owned()));

	(gateway, log)
}

pub fn body(response: &Response<Vec<u8>>) -> String {
	String::from_utf8_lossy(response.body()).into_owned()
}
