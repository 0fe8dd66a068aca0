//! Request dispatch: authorize, sign, call, classify, and the single retry after a 401.

// crates.io
use oauth2::http::{HeaderMap, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	gateway::{Gateway, coordinator::Authorized},
	http::{self, PreparedRequest, RequestSpec, TransportFuture},
	obs::{self, OpKind, OpOutcome, OpSpan, gateway_event},
};

impl Gateway {
	/// Sends an authorized request and classifies the outcome.
	///
	/// The credential is checked (and refreshed when needed) before the call. A 401 on a
	/// credential believed valid forces one more refresh and exactly one retry; a second 401
	/// ends the session. Responses below 400 are returned as-is, everything else maps to
	/// one [`Error`] variant.
	pub async fn send(&self, spec: RequestSpec) -> Result<HttpResponse> {
		const KIND: OpKind = OpKind::Send;

		let span = OpSpan::send(KIND, &spec.target);

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_request();

		let result = span.instrument(self.send_authorized(spec)).await;
		let status = match &result {
			Ok(response) => Some(response.status().as_u16()),
			Err(e) => e.status(),
		};

		if let Some(status) = status {
			span.record_status(status);
		}

		obs::record_response_class(status);

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn send_authorized(&self, spec: RequestSpec) -> Result<HttpResponse> {
		let prepared = spec.prepare(&self.config.base_url)?;
		let authorized = self.authorize(None, Some(&prepared)).await?;
		let first = authorized.credential.clone();
		let response = self.complete(&prepared, authorized).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			return classify(response);
		}

		self.retry_unauthorized(&prepared, &first).await
	}

	async fn retry_unauthorized(
		&self,
		prepared: &PreparedRequest,
		rejected: &Credential,
	) -> Result<HttpResponse> {
		const KIND: OpKind = OpKind::Retry;

		let span = OpSpan::send(KIND, &prepared.label());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_retry();
		gateway_event!(
			info,
			fingerprint = %rejected.fingerprint(),
			target = %prepared.label(),
			"Credential rejected with 401; retrying once."
		);

		let authorized = span.instrument(self.authorize(Some(rejected), Some(prepared))).await?;
		let retried = authorized.credential.clone();
		let response = span.instrument(self.complete(prepared, authorized)).await?;

		span.record_status(response.status().as_u16());

		if response.status() == StatusCode::UNAUTHORIZED {
			const REASON: &str = "server rejected a freshly refreshed credential";

			obs::record_op_outcome(KIND, OpOutcome::Failure);

			// Concurrent callers rejected on the same credential end the session only once.
			if self.expire_rejected(&retried) {
				self.notify_expired(REASON);
			}

			return Err(Error::auth_expired(REASON));
		}

		obs::record_op_outcome(KIND, OpOutcome::Success);

		classify(response)
	}

	async fn complete(
		&self,
		prepared: &PreparedRequest,
		authorized: Authorized,
	) -> Result<HttpResponse> {
		let call = match authorized.dispatched {
			Some(dispatched) => dispatched?,
			None => self.dispatch(prepared, &authorized.credential)?,
		};

		Ok(call.await?)
	}

	/// Signs `request` with `credential` and hands it to the transport.
	pub(super) fn dispatch(
		&self,
		request: &PreparedRequest,
		credential: &Credential,
	) -> Result<TransportFuture> {
		let mut headers = HeaderMap::new();

		self.signer.sign(&mut headers, credential)?;

		let request = request.to_http(headers)?;

		Ok(self.transport.call(request))
	}
}

/// Maps a response status onto the gateway's error taxonomy.
///
/// 401 never reaches this function; the dispatcher handles it.
pub(super) fn classify(response: HttpResponse) -> Result<HttpResponse> {
	let status = response.status().as_u16();

	if status < 400 {
		return Ok(response);
	}

	let message = http::body_preview(response.body());

	Err(match status {
		403 => Error::Forbidden { message },
		404 => Error::NotFound { message },
		500..=599 => Error::ServerError { status, message },
		_ => Error::RequestError { status: Some(status), message },
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Status fixture should be valid.");

		response
	}

	#[test]
	fn classify_maps_every_status_family() {
		assert!(classify(response(204, "")).is_ok());
		assert!(classify(response(302, "")).is_ok());
		assert!(matches!(
			classify(response(403, "no rights")),
			Err(Error::Forbidden { message }) if message == "no rights"
		));
		assert!(matches!(classify(response(404, "")), Err(Error::NotFound { .. })));
		assert!(matches!(
			classify(response(503, "maintenance")),
			Err(Error::ServerError { status: 503, .. })
		));
		assert!(matches!(
			classify(response(422, r#"{"msg":"title is required"}"#)),
			Err(Error::RequestError { status: Some(422), message }) if message.contains("title")
		));
	}
}
