//! Event ingest: decodes a raw `Event` into field-level state, synthesizes
//! heartbeats, and decides which sinks see what. One `Interpreter::process` call
//! per event, recursing once for a synthesized heartbeat.

use crate::cache::Cache;
use crate::forward_registry::{DataKind, EventKind, ForwardDoc, ForwardRegistry};
use avforward_core::{
	CoreError, Event, State, TAG_CORE_STATE, TAG_DETAIL_STATE, TAG_HARDWARE_INFO, TAG_HEARTBEAT,
};
use std::sync::Arc;

const AUTO_HEARTBEAT_KEY: &str = "auto-heartbeat";
const AUTO_HEARTBEAT_VALUE: &str = "ok";

pub struct Interpreter {
	cache: Arc<Cache>,
	forward: Arc<ForwardRegistry>,
}

impl Interpreter {
	pub fn new(cache: Arc<Cache>, forward: Arc<ForwardRegistry>) -> Self {
		Interpreter { cache, forward }
	}

	/// Runs one event through the full pipeline described in §4.4, recursing once for
	/// a synthesized heartbeat. Returns whether the *original* event's apply-to-record
	/// step reported a change (the recursive heartbeat's own change flag is not
	/// propagated back to the caller — it only affects what it itself forwards).
	pub async fn process(&self, event: Event) -> Result<bool, CoreError> {
		if let Some(heartbeat) = synthesize_heartbeat(&event) {
			// Recursion guard: `synthesize_heartbeat` itself refuses when `event` is
			// already heartbeat-tagged, so this can't loop.
			Box::pin(self.process(heartbeat)).await?;
		}

		if event.key != AUTO_HEARTBEAT_KEY {
			self.forward
				.send(DataKind::Event, EventKind::All, ForwardDoc::Event(event.clone()))
				.await;
		}

		if !event.has_any_tag(&[TAG_CORE_STATE, TAG_DETAIL_STATE, TAG_HEARTBEAT]) {
			return Ok(false);
		}

		let state = State {
			device_id: event.target_device.clone(),
			key: event.key.clone(),
			value: event.value.clone(),
			time: event.timestamp,
			tags: event.tags.clone(),
		};
		let (changed, record) = self.cache.store_device_event(state).await?;

		self.forward
			.send(DataKind::Device, EventKind::All, ForwardDoc::Device(record.clone()))
			.await;
		if changed && !event.has_any_tag(&[TAG_HEARTBEAT, TAG_HARDWARE_INFO]) {
			self.forward
				.send(DataKind::Event, EventKind::Delta, ForwardDoc::Event(event.clone()))
				.await;
			self.forward
				.send(DataKind::Device, EventKind::Delta, ForwardDoc::Device(record))
				.await;
		}

		Ok(changed)
	}
}

/// Builds the synthesized heartbeat event for `event`, or `None` if synthesis does
/// not apply: `event` is already heartbeat-tagged, carries no `generating_system`,
/// or `generating_system` has fewer than three hyphen-segments.
fn synthesize_heartbeat(event: &Event) -> Option<Event> {
	if event.generating_system.is_empty() || event.has_tag(TAG_HEARTBEAT) {
		return None;
	}
	let segments: Vec<&str> = event.generating_system.split('-').collect();
	if segments.len() < 3 {
		return None;
	}
	let room = format!("{}-{}", segments[0], segments[1]);
	Some(Event {
		generating_system: event.generating_system.clone(),
		timestamp: event.timestamp,
		tags: vec![TAG_HEARTBEAT.to_string()],
		target_device: event.generating_system.clone(),
		affected_room: room,
		key: AUTO_HEARTBEAT_KEY.to_string(),
		value: AUTO_HEARTBEAT_VALUE.into(),
		user: None,
		data: None,
	})
}
