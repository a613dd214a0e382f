//! HTTP admin surface (§6/§4.9, deliberately a thin external collaborator):
//! health, status, runtime log-level control, and read-only snapshot endpoints.
//! Mirrors the teacher's axum router style in `main.rs` — plain
//! `Router::new().route(...)` with a permissive CORS layer.

use crate::cache::Cache;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use log::LevelFilter;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AdminState {
	pub cache: Arc<Cache>,
	pub stream_hub: Arc<broadcast::Sender<String>>,
}

pub fn router(cache: Arc<Cache>, stream_hub: Arc<broadcast::Sender<String>>) -> Router {
	let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
	let state = AdminState { cache, stream_hub };
	Router::new()
		.route("/healthz", get(healthz))
		.route("/status", get(status))
		.route("/log-level", get(get_log_level))
		.route("/log-level/{level}", put(set_log_level))
		.route("/api/v1/devices", get(get_devices))
		.route("/api/v1/rooms", get(get_rooms))
		.route("/api/v1/stream", get(stream_upgrade))
		.with_state(state)
		.layer(cors)
}

async fn healthz() -> &'static str {
	"OK"
}

async fn status() -> &'static str {
	"Service is Active"
}

async fn get_log_level() -> String {
	log::max_level().to_string().to_ascii_lowercase()
}

async fn set_log_level(Path(level): Path<String>) -> (StatusCode, String) {
	match LevelFilter::from_str(&level) {
		Ok(filter) => {
			log::set_max_level(filter);
			(StatusCode::OK, filter.to_string().to_ascii_lowercase())
		}
		Err(_) => (StatusCode::BAD_REQUEST, format!("unknown log level: {level}")),
	}
}

/// Read-only operational visibility; does not participate in the forwarding
/// pipeline (§4.9).
async fn get_devices(State(state): State<AdminState>) -> Json<Vec<avforward_core::DeviceRecord>> {
	Json(state.cache.all_devices().await)
}

async fn get_rooms(State(state): State<AdminState>) -> Json<Vec<avforward_core::RoomRecord>> {
	Json(state.cache.all_rooms().await)
}

/// Upgrades to a websocket and streams every document the broadcast sink
/// publishes (§4.6.4) until the client disconnects.
async fn stream_upgrade(ws: WebSocketUpgrade, State(state): State<AdminState>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| stream_connection(socket, state.stream_hub.subscribe()))
}

async fn stream_connection(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
	loop {
		match rx.recv().await {
			Ok(text) => {
				if socket.send(Message::Text(text.into())).await.is_err() {
					return;
				}
			}
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				log::warn!("stream client lagged, dropped {skipped} messages");
			}
			Err(broadcast::error::RecvError::Closed) => return,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::forward_registry::ForwardRegistry;
	use axum::body::Body;
	use axum::http::Request;
	use tower::ServiceExt;

	fn test_router() -> Router {
		let cache = Arc::new(Cache::new(Arc::new(ForwardRegistry::new())));
		let hub = crate::sinks::broadcast::new_hub(16);
		router(cache, hub)
	}

	#[tokio::test]
	async fn healthz_reports_ok() {
		let response = test_router()
			.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn status_reports_active() {
		let response = test_router()
			.oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn valid_log_level_is_accepted_case_insensitively() {
		let response = test_router()
			.oneshot(
				Request::builder()
					.method("PUT")
					.uri("/log-level/DEBUG")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(log::max_level(), LevelFilter::Debug);
	}

	#[tokio::test]
	async fn invalid_log_level_is_rejected() {
		let response = test_router()
			.oneshot(
				Request::builder()
					.method("PUT")
					.uri("/log-level/nonsense")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn stream_endpoint_rejects_a_plain_get_without_upgrade_headers() {
		let response = test_router()
			.oneshot(Request::builder().uri("/api/v1/stream").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn devices_endpoint_returns_json_array() {
		let response = test_router()
			.oneshot(Request::builder().uri("/api/v1/devices").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}
}
