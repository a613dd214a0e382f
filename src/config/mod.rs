//! Configuration loading (§6): a JSON document with two top-level arrays, `caches`
//! and `forwarders`. Strings starting with the literal `ENV ` are dereferenced
//! against the process environment. Anything this module can't make sense of is a
//! `ConfigFatal` — the service refuses to start rather than run with a half-built
//! forward registry.

pub mod source;

use crate::forward_registry::{DataKind, EventKind, ForwardRegistry};
use crate::sinks::backend::{HttpBackend, SinkBackend};
use crate::sinks::index_name::{IndexNameFn, RotationCadence};
use crate::sinks::broadcast::BroadcastSink;
use crate::sinks::document_store::DocumentStoreSink;
use crate::sinks::log_ingest::LogIngestSink;
use crate::sinks::static_entity::StaticEntitySink;
use crate::sinks::timeseries::TimeseriesSink;
use avforward_core::CoreError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub fn config_path() -> std::path::PathBuf {
	match std::env::var("CONFIG_PATH") {
		Ok(val) => std::path::Path::new(&val).to_owned(),
		Err(_) => std::path::Path::new("./config.json").to_owned(),
	}
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
	pub caches: Vec<CacheConfig>,
	pub forwarders: Vec<ForwarderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
	pub name: String,
	pub url: String,
	#[serde(default)]
	pub token: Option<String>,
	#[serde(default = "default_cache_type", rename = "cache-type")]
	pub cache_type: String,
}

fn default_cache_type() -> String {
	"default".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
	Default,
	Legacy,
}

fn parse_cache_type(raw: &str) -> Result<CacheType, CoreError> {
	match raw.to_ascii_lowercase().as_str() {
		"default" => Ok(CacheType::Default),
		"legacy" => Ok(CacheType::Legacy),
		other => Err(CoreError::ConfigFatal(format!("unknown cache-type: {other}"))),
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ForwarderConfig {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub data_kind: String,
	pub event_kind: String,
	pub cache_name: String,
	#[serde(default = "default_interval_seconds")]
	pub interval_seconds: u64,
	#[serde(default)]
	pub index_pattern: Option<String>,
	#[serde(default)]
	pub rotation: Option<String>,
	#[serde(default)]
	pub upsert_by_id: Option<bool>,
	#[serde(default)]
	pub channel_name: Option<String>,
	#[serde(default)]
	pub buffer_size: Option<usize>,
}

fn default_interval_seconds() -> u64 {
	30
}

/// Dereferences `ENV <NAME>` strings against the process environment. Any other
/// string passes through unchanged.
pub fn dereference_env(raw: &str) -> Result<String, CoreError> {
	match raw.strip_prefix("ENV ") {
		Some(var) => std::env::var(var).map_err(|_| CoreError::ConfigFatal(format!("environment variable {var} is not set"))),
		None => Ok(raw.to_string()),
	}
}

pub fn parse(text: &str) -> Result<AppConfig, CoreError> {
	serde_json::from_str(text).map_err(|err| CoreError::ConfigFatal(format!("malformed configuration: {err}")))
}

fn parse_data_kind(raw: &str) -> Result<DataKind, CoreError> {
	match raw.to_ascii_lowercase().as_str() {
		"event" => Ok(DataKind::Event),
		"device" => Ok(DataKind::Device),
		"room" => Ok(DataKind::Room),
		other => Err(CoreError::ConfigFatal(format!("unknown data-kind: {other}"))),
	}
}

fn parse_event_kind(raw: &str) -> Result<EventKind, CoreError> {
	match raw.to_ascii_lowercase().as_str() {
		"all" => Ok(EventKind::All),
		"delta" => Ok(EventKind::Delta),
		other => Err(CoreError::ConfigFatal(format!("unknown event-kind: {other}"))),
	}
}

fn token_for_cache(config: &AppConfig, cache_name: &str) -> Option<String> {
	config.caches.iter().find(|c| c.name == cache_name).and_then(|c| c.token.clone())
}

/// Builds every backend named in `caches`, spawns the sink task for every entry in
/// `forwarders`, and registers each sink's sending half into a fresh
/// `ForwardRegistry`. The registry is immutable from this point on (§5).
/// `stream_hub` is the shared websocket fan-out a `broadcast`-type forwarder
/// publishes into; the same hub is handed to the admin surface's
/// `/api/v1/stream` route so subscribers see what gets published here.
pub async fn build_registry(
	config: &AppConfig,
	stream_hub: Arc<tokio::sync::broadcast::Sender<String>>,
) -> Result<ForwardRegistry, CoreError> {
	let mut backends: HashMap<String, Arc<dyn SinkBackend>> = HashMap::new();
	for cache in &config.caches {
		parse_cache_type(&cache.cache_type)?;
		let url = dereference_env(&cache.url)?;
		backends.insert(cache.name.clone(), Arc::new(HttpBackend::new(url)));
	}

	let mut registry = ForwardRegistry::new();
	for forwarder in &config.forwarders {
		let backend = backends.get(&forwarder.cache_name).cloned().ok_or_else(|| {
			CoreError::ConfigFatal(format!("forwarder {} references unknown cache {}", forwarder.name, forwarder.cache_name))
		})?;
		let data_kind = parse_data_kind(&forwarder.data_kind)?;
		let event_kind = parse_event_kind(&forwarder.event_kind)?;
		let interval = Duration::from_secs(forwarder.interval_seconds);

		match forwarder.kind.as_str() {
			"timeseries" => {
				let pattern = forwarder
					.index_pattern
					.clone()
					.ok_or_else(|| CoreError::ConfigFatal(format!("{}: timeseries forwarder requires index-pattern", forwarder.name)))?;
				let cadence = RotationCadence::parse(forwarder.rotation.as_deref().unwrap_or("none"))?;
				let (tx, rx) = TimeseriesSink::channel();
				TimeseriesSink::spawn(rx, backend, IndexNameFn::new(pattern, cadence), interval);
				registry.register(data_kind, event_kind, tx);
			}
			"static" => {
				let pattern = forwarder
					.index_pattern
					.clone()
					.ok_or_else(|| CoreError::ConfigFatal(format!("{}: static forwarder requires index-pattern", forwarder.name)))?;
				let upsert_by_id = forwarder.upsert_by_id.unwrap_or(true);
				let (utx, urx, ttx, trx) = StaticEntitySink::channels();
				StaticEntitySink::spawn(urx, trx, backend, pattern, upsert_by_id, interval);
				registry.register(data_kind, event_kind, utx);
				registry.register_tombstone(data_kind, ttx);
			}
			"document-store" => {
				let pattern = forwarder
					.index_pattern
					.clone()
					.ok_or_else(|| CoreError::ConfigFatal(format!("{}: document-store forwarder requires index-pattern", forwarder.name)))?;
				let (tx, rx) = DocumentStoreSink::channel();
				DocumentStoreSink::spawn(rx, backend, pattern, interval);
				registry.register(data_kind, event_kind, tx);
			}
			"broadcast" => {
				let channel_name = forwarder.channel_name.clone().unwrap_or_else(|| forwarder.name.clone());
				let (tx, rx) = BroadcastSink::channel();
				BroadcastSink::spawn(rx, stream_hub.clone(), channel_name);
				registry.register(data_kind, event_kind, tx);
			}
			"log-ingest" => {
				let url = forwarder.index_pattern.clone().ok_or_else(|| {
					CoreError::ConfigFatal(format!("{}: log-ingest forwarder requires an index-pattern used as its destination URL", forwarder.name))
				})?;
				let url = dereference_env(&url)?;
				let token = match token_for_cache(config, &forwarder.cache_name) {
					Some(raw) => dereference_env(&raw)?,
					None => String::new(),
				};
				let buffer_size = forwarder.buffer_size.unwrap_or(500);
				let (tx, rx) = LogIngestSink::channel();
				LogIngestSink::spawn(rx, backend, url, token, "UTC", interval, buffer_size);
				registry.register(data_kind, event_kind, tx);
			}
			other => {
				return Err(CoreError::ConfigFatal(format!("{}: unknown forwarder type {other}", forwarder.name)));
			}
		}
	}

	Ok(registry)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn env_prefixed_string_is_dereferenced() {
		std::env::set_var("AVFORWARD_TEST_TOKEN", "secret-token");
		assert_eq!(dereference_env("ENV AVFORWARD_TEST_TOKEN").unwrap(), "secret-token");
		std::env::remove_var("AVFORWARD_TEST_TOKEN");
	}

	#[test]
	fn plain_string_passes_through_unchanged() {
		assert_eq!(dereference_env("https://sink.example").unwrap(), "https://sink.example");
	}

	#[test]
	fn missing_env_var_is_config_fatal() {
		assert!(dereference_env("ENV AVFORWARD_DOES_NOT_EXIST").is_err());
	}

	#[test]
	fn unknown_forwarder_data_kind_is_rejected() {
		assert!(parse_data_kind("bogus").is_err());
	}

	#[tokio::test]
	async fn unknown_forwarder_type_is_config_fatal() {
		let config = AppConfig {
			caches: vec![CacheConfig {
				name: "primary".to_string(),
				url: "https://sink.example".to_string(),
				token: None,
				cache_type: default_cache_type(),
			}],
			forwarders: vec![ForwarderConfig {
				name: "bad".to_string(),
				kind: "carrier-pigeon".to_string(),
				data_kind: "device".to_string(),
				event_kind: "all".to_string(),
				cache_name: "primary".to_string(),
				interval_seconds: 30,
				index_pattern: None,
				rotation: None,
				upsert_by_id: None,
				channel_name: None,
				buffer_size: None,
			}],
		};
		assert!(build_registry(&config, crate::sinks::broadcast::new_hub(16)).await.is_err());
	}

	#[tokio::test]
	async fn timeseries_forwarder_from_json_is_registered() {
		let text = r#"{
			"caches": [{"name": "primary", "url": "https://sink.example"}],
			"forwarders": [{
				"name": "events-ts",
				"type": "timeseries",
				"data-kind": "event",
				"event-kind": "all",
				"cache-name": "primary",
				"interval-seconds": 5,
				"index-pattern": "events",
				"rotation": "daily"
			}]
		}"#;
		let config = parse(text).unwrap();
		let registry = build_registry(&config, crate::sinks::broadcast::new_hub(16)).await.unwrap();
		let (tx, mut rx) = tokio::sync::mpsc::channel(1);
		registry.register(DataKind::Room, EventKind::Delta, tx);
		registry
			.send(
				DataKind::Room,
				EventKind::Delta,
				crate::forward_registry::ForwardDoc::Room(avforward_core::RoomRecord::new("HBLL-205")),
			)
			.await;
		assert!(rx.try_recv().is_ok());
	}

	#[test]
	fn malformed_json_is_config_fatal() {
		assert!(parse("{ not json").is_err());
	}

	#[test]
	fn cache_type_defaults_to_default_when_absent() {
		let config: AppConfig = parse(r#"{
			"caches": [{"name": "primary", "url": "https://sink.example"}],
			"forwarders": []
		}"#).unwrap();
		assert_eq!(config.caches[0].cache_type, "default");
	}

	#[tokio::test]
	async fn unknown_cache_type_is_config_fatal() {
		let config: AppConfig = parse(r#"{
			"caches": [{"name": "primary", "url": "https://sink.example", "cache-type": "quantum"}],
			"forwarders": []
		}"#).unwrap();
		assert!(build_registry(&config, crate::sinks::broadcast::new_hub(16)).await.is_err());
	}

	#[tokio::test]
	async fn legacy_cache_type_is_accepted() {
		let config: AppConfig = parse(r#"{
			"caches": [{"name": "primary", "url": "https://sink.example", "cache-type": "Legacy"}],
			"forwarders": []
		}"#).unwrap();
		assert!(build_registry(&config, crate::sinks::broadcast::new_hub(16)).await.is_ok());
	}

	#[tokio::test]
	async fn static_forwarder_registers_a_reachable_tombstone_sender() {
		let text = r#"{
			"caches": [{"name": "primary", "url": "https://sink.example"}],
			"forwarders": [{
				"name": "devices-static",
				"type": "static",
				"data-kind": "device",
				"event-kind": "all",
				"cache-name": "primary",
				"interval-seconds": 5,
				"index-pattern": "devices"
			}]
		}"#;
		let config = parse(text).unwrap();
		let registry = build_registry(&config, crate::sinks::broadcast::new_hub(16)).await.unwrap();
		// If the tombstone sender hadn't been wired into the registry this would be
		// a silent no-op; the static-entity sink task is still alive to receive it.
		registry.send_tombstone(DataKind::Device, "HBLL-205-D1".to_string()).await;
	}
}
