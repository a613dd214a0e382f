//! Process-wide `(dataKind, eventKind) -> [sink]` map. Built once at startup from
//! configuration and read-only thereafter; each sink is represented by the sending
//! half of its buffered forwarder's incoming channel (see `sinks`).

use avforward_core::{DeviceRecord, Event, RoomRecord};
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
	Event,
	Device,
	Room,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	All,
	Delta,
}

/// A single document handed to a buffered forwarder's incoming channel.
#[derive(Debug, Clone)]
pub enum ForwardDoc {
	Event(Event),
	Device(DeviceRecord),
	Room(RoomRecord),
}

/// Buffer-manager sinks register a sending half here; `Send`-ing into it is the
/// non-blocking-in-the-common-case contract the spec describes, backed by the
/// channel's own buffering (capacity 10 000 per §4.6) and true backpressure only
/// once that buffer itself is full.
///
/// `tombstones` is a second, narrower map alongside `sinks`: the static-entity
/// sink's delete inbox (§4.6.2) takes a bare ID rather than a full `ForwardDoc`,
/// so it is registered here by `DataKind` alone and fed from the cache's own
/// `remove_device`/`remove_room` path rather than from the event-ingest path.
pub struct ForwardRegistry {
	sinks: HashMap<(DataKind, EventKind), Vec<mpsc::Sender<ForwardDoc>>>,
	tombstones: HashMap<DataKind, Vec<mpsc::Sender<String>>>,
}

impl Default for ForwardRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl ForwardRegistry {
	pub fn new() -> Self {
		ForwardRegistry {
			sinks: HashMap::new(),
			tombstones: HashMap::new(),
		}
	}

	pub fn register(&mut self, data: DataKind, kind: EventKind, tx: mpsc::Sender<ForwardDoc>) {
		self.sinks.entry((data, kind)).or_default().push(tx);
	}

	pub fn register_tombstone(&mut self, data: DataKind, tx: mpsc::Sender<String>) {
		self.tombstones.entry(data).or_default().push(tx);
	}

	/// Delivers `doc` to every sink registered for `(data, kind)`. A closed sink
	/// (its flusher task died) is logged and otherwise ignored — per §7,
	/// sink failures never propagate to the caller.
	pub async fn send(&self, data: DataKind, kind: EventKind, doc: ForwardDoc) {
		let Some(targets) = self.sinks.get(&(data, kind)) else {
			return;
		};
		for tx in targets {
			if tx.send(doc.clone()).await.is_err() {
				log::warn!("forward sink for {data:?}/{kind:?} is no longer accepting documents");
			}
		}
	}

	/// Delivers a delete tombstone for `id` to every static-entity sink
	/// registered for `data`. Called from the cache's `remove_device`/
	/// `remove_room` path, not from event ingest.
	pub async fn send_tombstone(&self, data: DataKind, id: String) {
		let Some(targets) = self.tombstones.get(&data) else {
			return;
		};
		for tx in targets {
			if tx.send(id.clone()).await.is_err() {
				log::warn!("static-entity sink for {data:?} is no longer accepting tombstones");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use avforward_core::DeviceRecord;

	#[tokio::test]
	async fn send_reaches_every_registered_sink() {
		let mut registry = ForwardRegistry::new();
		let (tx1, mut rx1) = mpsc::channel(10);
		let (tx2, mut rx2) = mpsc::channel(10);
		registry.register(DataKind::Device, EventKind::All, tx1);
		registry.register(DataKind::Device, EventKind::All, tx2);

		registry
			.send(
				DataKind::Device,
				EventKind::All,
				ForwardDoc::Device(DeviceRecord::new("HBLL-205-D1")),
			)
			.await;

		assert!(rx1.try_recv().is_ok());
		assert!(rx2.try_recv().is_ok());
	}

	#[tokio::test]
	async fn send_to_unregistered_key_is_a_noop() {
		let registry = ForwardRegistry::new();
		registry
			.send(
				DataKind::Room,
				EventKind::Delta,
				ForwardDoc::Room(avforward_core::RoomRecord::new("HBLL-205")),
			)
			.await;
	}

	#[tokio::test]
	async fn send_tombstone_reaches_every_registered_sink() {
		let mut registry = ForwardRegistry::new();
		let (tx, mut rx) = mpsc::channel(10);
		registry.register_tombstone(DataKind::Device, tx);

		registry.send_tombstone(DataKind::Device, "HBLL-205-D1".to_string()).await;

		assert_eq!(rx.try_recv().unwrap(), "HBLL-205-D1");
	}

	#[tokio::test]
	async fn send_tombstone_to_unregistered_kind_is_a_noop() {
		let registry = ForwardRegistry::new();
		registry.send_tombstone(DataKind::Room, "HBLL-205".to_string()).await;
	}
}
