//! The TLS-terminated inner handler shared by the `:12345` passthrough
//! listener and the hijacked-connection channel fed by `crate::proxy::
//! outer`. Grounded on `proxy/proxy.go`'s `appProxy` and `proxy/policy.go`'s
//! `ServeHTTP`: leaf certs are resolved per-SNI, the control host
//! short-circuits to `crate::proxy::control`, everything else is
//! classified, policy-checked twice (request and response phase), forwarded
//! to origin, and inspected in between.

use std::collections::HashMap;
use std::net::SocketAddr;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HOST;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::hijack::HijackListener;
use crate::inspectors::checksum::ChecksumCheck;
use crate::inspectors::filesize::FileSizeCheck;
use crate::inspectors::mime::MimeCheck;
use crate::inspectors::php_check::PhpCheck;
use crate::inspectors::secret_scan::{SecretPolicy, SecretScan};
use crate::model::{Activity, AlertLevel, Decision as ModelDecision, TechCheck};
use crate::policy::{self, PolicyCheck, PolicyInput, RequestMetadata, RequestPolicyInput, ResponsePolicyInput};
use crate::proxy::dispatch;
use crate::reader_chain::{self, InspectCtx, Inspector};
use crate::state::AppState;

pub async fn serve_tls_passthrough(addr: SocketAddr, acceptor: TlsAcceptor, state: AppState) -> anyhow::Result<()> {
	let listener = TcpListener::bind(addr).await?;
	tracing::info!(%addr, "TLS passthrough listener started");

	loop {
		let (stream, peer) = match listener.accept().await {
			Ok(v) => v,
			Err(e) => {
				tracing::warn!(error = %e, "accept failed on passthrough listener");
				continue;
			}
		};
		let _ = stream.set_nodelay(true);
		serve_one(acceptor.clone(), stream, peer.ip().to_string(), state.clone());
	}
}

pub async fn serve_hijacked(mut listener: HijackListener, acceptor: TlsAcceptor, state: AppState) -> anyhow::Result<()> {
	tracing::info!("hijack-channel TLS listener started");
	while let Some(hijacked) = listener.accept().await {
		state.metrics.hijacked_connections_total.inc();
		serve_one(acceptor.clone(), hijacked.stream, hijacked.remote_addr, state.clone());
	}
	Ok(())
}

fn serve_one<S>(acceptor: TlsAcceptor, stream: S, remote_addr: String, state: AppState)
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
	tokio::spawn(async move {
		state.metrics.connections_accepted_total.inc();
		state.metrics.active_connections.inc();
		let metrics = state.metrics.clone();

		let tls_stream = match acceptor.accept(stream).await {
			Ok(s) => s,
			Err(e) => {
				tracing::debug!(error = %e, "TLS handshake failed on intercepted connection");
				metrics.active_connections.dec();
				return;
			}
		};

		let io = TokioIo::new(tls_stream);
		let remote_addr = std::sync::Arc::new(remote_addr);
		let conn_state = state.clone();
		let conn = http1::Builder::new().serve_connection(
			io,
			service_fn(move |req| {
				let state = conn_state.clone();
				let remote_addr = remote_addr.clone();
				async move { handle_request(req, (*remote_addr).clone(), state).await }
			}),
		);
		if let Err(e) = conn.await {
			tracing::debug!(error = %e, "intercepted connection ended");
		}
		metrics.active_connections.dec();
	});
}

fn header_map_to_hash(headers: &hyper::HeaderMap) -> HashMap<String, String> {
	headers.iter().filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string()))).collect()
}

async fn body_bytes(body: Incoming) -> Vec<u8> {
	match body.collect().await {
		Ok(collected) => collected.to_bytes().to_vec(),
		Err(e) => {
			tracing::warn!(error = %e, "failed reading request body");
			Vec::new()
		}
	}
}

fn parse_form(body: &[u8]) -> HashMap<String, String> {
	url::form_urlencoded::parse(body).into_owned().collect()
}

fn model_decision(s: &str) -> ModelDecision {
	match s {
		policy::DENY => ModelDecision::Deny,
		policy::ALERT => ModelDecision::Alert,
		_ => ModelDecision::Allow,
	}
}

fn record_decision_metric(state: &AppState, decision: &str) {
	match decision {
		policy::DENY => state.metrics.decisions_deny_total.inc(),
		policy::ALERT => state.metrics.decisions_alert_total.inc(),
		_ => state.metrics.decisions_allow_total.inc(),
	}
}

fn policy_check_to_tech_check(check: &PolicyCheck) -> TechCheck {
	let (name, alert_level) = match check.decision.to_ascii_lowercase().as_str() {
		"deny" => ("Block", AlertLevel::Critical),
		"alert" => ("Alert", AlertLevel::Warning),
		_ => ("Allow", AlertLevel::None),
	};
	TechCheck {
		name: name.to_string(),
		policy: check.policy.clone(),
		decision_label: check.decision.clone(),
		alert_level,
		score: alert_level.score(),
		details: check.detail.clone(),
	}
}

/// Runs a policy decision, folding a decider failure into a forced `alert`
/// rather than failing the request closed — per-request policy errors are
/// reported, not treated as a deny. Also hands back the raw decision
/// document so the request phase can pull `final_secret_decision` out of it
/// for the response-phase secret scan.
async fn decide(state: &AppState, input: &PolicyInput) -> (policy::Decision, Option<Value>) {
	let timer = state.metrics.decision_duration_seconds.start_timer();
	let result = state.decider.decide(input).await;
	timer.observe_duration();

	let (decision, raw) = match result {
		Ok(raw) => {
			let decision = policy::parse_decision(&raw).unwrap_or_else(|e| {
				tracing::warn!(error = %e, "malformed policy decision, forcing alert");
				forced_alert()
			});
			(decision, Some(raw))
		}
		Err(e) => {
			tracing::error!(error = %e, "policy decider error");
			state.metrics.decision_errors_total.inc();
			(forced_alert(), None)
		}
	};
	record_decision_metric(state, &decision.decision);
	(decision, raw)
}

fn forced_alert() -> policy::Decision {
	policy::Decision { decision: policy::ALERT.to_string(), alert_level: AlertLevel::Error, detail: String::new(), policy_checks: vec![] }
}

fn resolve_host_key(state: &AppState, remote_addr: &str) -> Option<String> {
	if state.settings.global_session {
		state.sessions.find_first().map(|(key, _)| key)
	} else {
		state.sessions.find(remote_addr).map(|_| remote_addr.to_string())
	}
}

fn append_and_maybe_track(state: &AppState, host_key: Option<&str>, activity: Activity) {
	state.metrics.activities_by_ecosystem_total.inc();
	if matches!(activity.kind, crate::model::ActivityKind::Web) {
		state.metrics.activities_unclassified_total.inc();
	}
	if let Some(key) = host_key {
		state.sessions.append_activity(key, activity);
	}
}

fn forbidden_response() -> Response<Full<Bytes>> {
	let mut resp = Response::new(Full::new(Bytes::new()));
	*resp.status_mut() = StatusCode::FORBIDDEN;
	resp
}

fn build_request_input(activity: &Activity, state: &AppState) -> PolicyInput {
	PolicyInput {
		is_response_ready: false,
		request: RequestPolicyInput {
			action: activity.action.clone(),
			host: activity.host.clone(),
			details: serde_json::to_value(&activity.details).unwrap_or(Value::Null),
			package_registry: activity.kind,
			api_key: state.settings.invisirisk_jwt_token.clone(),
			additional_context: HashMap::new(),
		},
		response: None,
	}
}

async fn serve_control(path: &str, remote_addr: &str, body: &[u8], state: &AppState) -> Response<Full<Bytes>> {
	match path {
		"/start" => {
			crate::proxy::control::start(state, remote_addr, &parse_form(body));
			Response::new(Full::new(Bytes::new()))
		}
		"/end" => {
			crate::proxy::control::end(state, remote_addr, &parse_form(body));
			Response::new(Full::new(Bytes::new()))
		}
		"/ca" => match crate::proxy::control::ca_cert_pem(state) {
			Ok(pem) => Response::new(Full::new(Bytes::from(pem))),
			Err(e) => {
				tracing::warn!(error = %e, "CA certificate not available");
				let mut resp = Response::new(Full::new(Bytes::new()));
				*resp.status_mut() = StatusCode::NOT_FOUND;
				resp
			}
		},
		_ => {
			let mut resp = Response::new(Full::new(Bytes::new()));
			*resp.status_mut() = StatusCode::NOT_FOUND;
			resp
		}
	}
}

async fn handle_request(req: Request<Incoming>, remote_addr: String, state: AppState) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
	let host = req.headers().get(HOST).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
	let method = req.method().clone();
	let uri_path = req.uri().path().to_string();
	let query = req.uri().query().unwrap_or("").to_string();
	let user_agent = req.headers().get(hyper::header::USER_AGENT).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
	let req_headers = header_map_to_hash(req.headers());
	let body = body_bytes(req.into_body()).await;

	if host == dispatch::CONTROL_HOST {
		return Ok(serve_control(&uri_path, &remote_addr, &body, &state).await);
	}

	let host_key = resolve_host_key(&state, &remote_addr);

	let mut activity = match &host_key {
		Some(key) => {
			let mut built: Option<Activity> = None;
			state.sessions.with_package_map(key, |map| {
				built = Some(dispatch::classify_request(&host, &uri_path, &query, &user_agent, method.as_str(), &state.repo_config, map));
			});
			match built {
				Some(a) => a,
				None => {
					let mut local = HashMap::new();
					dispatch::classify_request(&host, &uri_path, &query, &user_agent, method.as_str(), &state.repo_config, &mut local)
				}
			}
		}
		None => {
			let mut local = HashMap::new();
			dispatch::classify_request(&host, &uri_path, &query, &user_agent, method.as_str(), &state.repo_config, &mut local)
		}
	};
	state.metrics.activities_classified_total.inc();

	let url = if query.is_empty() { format!("https://{}{}", host, uri_path) } else { format!("https://{}{}?{}", host, uri_path, query) };

	let (request_decision, request_raw) = decide(&state, &build_request_input(&activity, &state)).await;
	activity.apply_decision(model_decision(&request_decision.decision), request_decision.alert_level, false);
	for check in &request_decision.policy_checks {
		crate::inspectors::append_check(&mut activity, policy_check_to_tech_check(check));
	}

	let secret_policy = request_raw.as_ref().map(policy::parse_secret_policy).unwrap_or_default();

	if activity.decision == ModelDecision::Deny {
		append_and_maybe_track(&state, host_key.as_deref(), activity);
		return Ok(forbidden_response());
	}

	let (status, resp_headers, resp_body) = match state.upstream.forward(&method, &url, req_headers.clone(), body).await {
		Ok(r) => (r.status, r.headers, r.body),
		Err(e) => {
			tracing::error!(error = %e, %url, "upstream request failed");
			append_and_maybe_track(&state, host_key.as_deref(), activity);
			let mut resp = Response::new(Full::new(Bytes::from_static(b"upstream request failed")));
			*resp.status_mut() = StatusCode::BAD_GATEWAY;
			return Ok(resp);
		}
	};

	let content_disposition = resp_headers.get("content-disposition").cloned();
	let content_type = resp_headers.get("content-type").cloned().unwrap_or_default();

	let mut inspectors: Vec<Box<dyn Inspector>> = vec![
		Box::new(MimeCheck),
		Box::new(ChecksumCheck),
		Box::new(FileSizeCheck),
		Box::new(PhpCheck),
		Box::new(SecretScan::new(
			state.secret_rules.clone(),
			"response",
			SecretPolicy {
				enabled: secret_policy.check,
				on_secret_action: model_decision(&secret_policy.result),
				alert_level: secret_policy.alert_level,
			},
			state.metrics.clone(),
		)),
	];
	{
		let mut ctx = InspectCtx { url: url.clone(), content_disposition, activity: &mut activity };
		reader_chain::run_chain(&resp_body, &mut ctx, &mut inspectors);
	}

	let checksum = activity.checks.iter().find(|c| c.name == "checksum").map(|c| c.details.clone()).unwrap_or_default();

	let response_input = PolicyInput {
		is_response_ready: true,
		request: RequestPolicyInput {
			action: activity.action.clone(),
			host: activity.host.clone(),
			details: serde_json::to_value(&activity.details).unwrap_or(Value::Null),
			package_registry: activity.kind,
			api_key: state.settings.invisirisk_jwt_token.clone(),
			additional_context: HashMap::new(),
		},
		response: Some(ResponsePolicyInput {
			status_code: status,
			status: status.to_string(),
			headers: resp_headers,
			request: RequestMetadata { method: method.to_string(), url: url.clone(), headers: req_headers },
			mime_type: content_type,
			checksum,
			content_length: resp_body.len() as f32,
			file_size: resp_body.len() as u64,
		}),
	};

	let (response_decision, _response_raw) = decide(&state, &response_input).await;
	activity.apply_decision(model_decision(&response_decision.decision), response_decision.alert_level, true);
	for check in &response_decision.policy_checks {
		crate::inspectors::append_check(&mut activity, policy_check_to_tech_check(check));
	}

	let final_status =
		if activity.decision == ModelDecision::Deny { StatusCode::FORBIDDEN } else { StatusCode::from_u16(status).unwrap_or(StatusCode::OK) };

	append_and_maybe_track(&state, host_key.as_deref(), activity);

	let mut response = Response::new(Full::new(Bytes::from(resp_body)));
	*response.status_mut() = final_status;
	Ok(response)
}
