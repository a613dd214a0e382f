//! In-memory device/room cache: one actor per entity, found-or-created under a
//! read-preferring double-checked lock, mirroring the upstream memorycache's
//! `sync.RWMutex` + lazy-manager-creation pattern from `deviceitemmanager.go`.

use crate::entity_actor::{DeviceHandle, RoomHandle};
use crate::forward_registry::{DataKind, EventKind, ForwardDoc, ForwardRegistry};
use avforward_core::{CoreError, DeviceRecord, RoomRecord, State};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};

/// How long `all_devices`/`all_rooms` waits for actors to reply before giving up on
/// the stragglers and returning whatever arrived. Mirrors the upstream's hard-coded
/// one-second sweep timeout.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Cache {
	devices: RwLock<HashMap<String, DeviceHandle>>,
	rooms: RwLock<HashMap<String, RoomHandle>>,
	forward: Arc<ForwardRegistry>,
}

impl Cache {
	pub fn new(forward: Arc<ForwardRegistry>) -> Self {
		Cache {
			devices: RwLock::new(HashMap::new()),
			rooms: RwLock::new(HashMap::new()),
			forward,
		}
	}

	/// Returns the actor for `device_id`, spawning one on first reference.
	pub async fn device(&self, device_id: &str) -> DeviceHandle {
		if let Some(handle) = self.devices.read().await.get(device_id) {
			return handle.clone();
		}
		let mut devices = self.devices.write().await;
		if let Some(handle) = devices.get(device_id) {
			return handle.clone();
		}
		let handle = DeviceHandle::spawn(device_id);
		devices.insert(device_id.to_string(), handle.clone());
		handle
	}

	/// Returns the actor for `room_id`, spawning one on first reference.
	pub async fn room(&self, room_id: &str) -> RoomHandle {
		if let Some(handle) = self.rooms.read().await.get(room_id) {
			return handle.clone();
		}
		let mut rooms = self.rooms.write().await;
		if let Some(handle) = rooms.get(room_id) {
			return handle.clone();
		}
		let handle = RoomHandle::spawn(room_id);
		rooms.insert(room_id.to_string(), handle.clone());
		handle
	}

	/// Find-or-create, then apply a single field-level write (the event-ingest path).
	pub async fn store_device_event(&self, state: State) -> Result<(bool, DeviceRecord), CoreError> {
		let handle = self.device(&state.device_id).await;
		let changed = handle.write(state).await?;
		let record = handle.snapshot().await?;
		Ok((changed, record))
	}

	/// Find-or-create, then merge a whole incoming record (the bootstrap/periodic-push
	/// path). On success, fans the resulting record out to `(device, ALL)` and, if
	/// changed, `(device, DELTA)`.
	pub async fn check_and_store_device(
		&self,
		incoming: DeviceRecord,
	) -> Result<(bool, DeviceRecord), CoreError> {
		let handle = self.device(&incoming.device_id).await;
		let (merged, changed) = handle.merge(incoming).await?;

		self.forward
			.send(DataKind::Device, EventKind::All, ForwardDoc::Device(merged.clone()))
			.await;
		if changed {
			self.forward
				.send(DataKind::Device, EventKind::Delta, ForwardDoc::Device(merged.clone()))
				.await;
		}

		Ok((changed, merged))
	}

	pub async fn check_and_store_room(
		&self,
		incoming: RoomRecord,
	) -> Result<(bool, RoomRecord), CoreError> {
		let handle = self.room(&incoming.room_id).await;
		let (merged, changed) = handle.merge(incoming).await?;

		self.forward
			.send(DataKind::Room, EventKind::All, ForwardDoc::Room(merged.clone()))
			.await;
		if changed {
			self.forward
				.send(DataKind::Room, EventKind::Delta, ForwardDoc::Room(merged.clone()))
				.await;
		}

		Ok((changed, merged))
	}

	/// Find-only: absence is not an error, it returns a freshly synthesized default.
	pub async fn get_device_record(&self, device_id: &str) -> Result<DeviceRecord, CoreError> {
		if let Some(handle) = self.devices.read().await.get(device_id) {
			return handle.snapshot().await;
		}
		Ok(DeviceRecord::new(device_id))
	}

	pub async fn get_room_record(&self, room_id: &str) -> Result<RoomRecord, CoreError> {
		if let Some(handle) = self.rooms.read().await.get(room_id) {
			return handle.snapshot().await;
		}
		Ok(RoomRecord::new(room_id))
	}

	/// Seeds (or replaces) the actor for a device loaded from durable storage at
	/// startup, bypassing the synthesized `DeviceRecord::new` default.
	pub async fn seed_device(&self, record: DeviceRecord) {
		let mut devices = self.devices.write().await;
		devices.insert(record.device_id.clone(), DeviceHandle::spawn_with(record));
	}

	pub async fn seed_room(&self, record: RoomRecord) {
		let mut rooms = self.rooms.write().await;
		rooms.insert(record.room_id.clone(), RoomHandle::spawn_with(record));
	}

	/// Terminates the actor and publishes a delete tombstone to any static-entity
	/// sink registered for `(Device)` (§4.6.2) — the only path that can ever
	/// deliver into that sink's tombstone inbox.
	pub async fn remove_device(&self, device_id: &str) {
		let mut devices = self.devices.write().await;
		if let Some(handle) = devices.remove(device_id) {
			handle.terminate().await;
		}
		drop(devices);
		self.forward.send_tombstone(DataKind::Device, device_id.to_string()).await;
	}

	pub async fn remove_room(&self, room_id: &str) {
		let mut rooms = self.rooms.write().await;
		if let Some(handle) = rooms.remove(room_id) {
			handle.terminate().await;
		}
		drop(rooms);
		self.forward.send_tombstone(DataKind::Room, room_id.to_string()).await;
	}

	/// Removes the room record and every device whose ID is prefixed by `room_id`,
	/// returning the list of removed device IDs.
	pub async fn nuke_room(&self, room_id: &str) -> Vec<String> {
		self.remove_room(room_id).await;

		let matching: Vec<String> = {
			let devices = self.devices.read().await;
			devices
				.keys()
				.filter(|id| id.starts_with(room_id))
				.cloned()
				.collect()
		};
		for id in &matching {
			self.remove_device(id).await;
		}
		matching
	}

	/// Snapshots every device in the cache. Actors that don't reply within
	/// `SNAPSHOT_TIMEOUT` are silently dropped from the result rather than stalling
	/// the whole sweep.
	pub async fn all_devices(&self) -> Vec<DeviceRecord> {
		let handles: Vec<DeviceHandle> = self.devices.read().await.values().cloned().collect();
		let mut receivers = Vec::with_capacity(handles.len());
		for handle in &handles {
			let (tx, rx) = oneshot::channel();
			if handle.request_snapshot(tx) {
				receivers.push(rx);
			}
		}
		collect_within_timeout(receivers).await
	}

	pub async fn all_rooms(&self) -> Vec<RoomRecord> {
		let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
		let mut receivers = Vec::with_capacity(handles.len());
		for handle in &handles {
			let (tx, rx) = oneshot::channel();
			if handle.request_snapshot(tx) {
				receivers.push(rx);
			}
		}
		collect_within_timeout(receivers).await
	}

	pub async fn device_count(&self) -> usize {
		self.devices.read().await.len()
	}

	pub async fn room_count(&self) -> usize {
		self.rooms.read().await.len()
	}
}

async fn collect_within_timeout<T>(receivers: Vec<oneshot::Receiver<T>>) -> Vec<T> {
	let deadline = tokio::time::Instant::now() + SNAPSHOT_TIMEOUT;
	let mut out = Vec::with_capacity(receivers.len());
	for rx in receivers {
		match tokio::time::timeout_at(deadline, rx).await {
			Ok(Ok(value)) => out.push(value),
			_ => continue,
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use avforward_core::FieldValue;
	use chrono::Utc;

	fn empty_cache() -> Cache {
		Cache::new(Arc::new(ForwardRegistry::new()))
	}

	#[tokio::test]
	async fn find_or_create_returns_same_actor() {
		let cache = empty_cache();
		let a = cache.device("HBLL-205-D1").await;
		let b = cache.device("HBLL-205-D1").await;
		a.write(State {
			device_id: "HBLL-205-D1".to_string(),
			key: "power".to_string(),
			value: FieldValue::from("on"),
			time: Utc::now(),
			tags: vec![],
		})
		.await
		.unwrap();
		let snap = b.snapshot().await.unwrap();
		assert_eq!(snap.power, "on");
	}

	#[tokio::test]
	async fn all_devices_includes_every_seeded_actor() {
		let cache = empty_cache();
		cache.device("HBLL-205-D1").await;
		cache.device("HBLL-206-D1").await;
		let all = cache.all_devices().await;
		assert_eq!(all.len(), 2);
	}

	#[tokio::test]
	async fn removed_device_is_absent_from_sweep() {
		let cache = empty_cache();
		cache.device("HBLL-205-D1").await;
		cache.remove_device("HBLL-205-D1").await;
		assert_eq!(cache.all_devices().await.len(), 0);
	}

	#[tokio::test]
	async fn get_device_record_on_absent_id_is_a_default_with_no_error() {
		let cache = empty_cache();
		let record = cache.get_device_record("HBLL-205-D1").await.unwrap();
		assert_eq!(record.power, "");
		assert_eq!(cache.device_count().await, 0, "a find-only read must not create an actor");
	}

	#[tokio::test]
	async fn nuke_room_removes_only_matching_devices() {
		let cache = empty_cache();
		cache.device("HBLL-205-D1").await;
		cache.device("HBLL-205-D2").await;
		cache.device("HBLL-206-D1").await;
		cache.room("HBLL-205").await;

		let mut removed = cache.nuke_room("HBLL-205").await;
		removed.sort();
		assert_eq!(removed, vec!["HBLL-205-D1".to_string(), "HBLL-205-D2".to_string()]);
		assert_eq!(cache.device_count().await, 1);
		assert_eq!(cache.room_count().await, 0);
	}

	#[tokio::test]
	async fn check_and_store_device_fans_out_to_all_and_delta() {
		let mut registry = ForwardRegistry::new();
		let (all_tx, mut all_rx) = tokio::sync::mpsc::channel(10);
		let (delta_tx, mut delta_rx) = tokio::sync::mpsc::channel(10);
		registry.register(DataKind::Device, EventKind::All, all_tx);
		registry.register(DataKind::Device, EventKind::Delta, delta_tx);
		let cache = Cache::new(Arc::new(registry));

		let mut incoming = DeviceRecord::new("HBLL-205-D1");
		incoming.power = "on".to_string();
		incoming.update_times.insert("power".to_string(), Utc::now());

		let (changed, _) = cache.check_and_store_device(incoming).await.unwrap();
		assert!(changed);
		assert!(all_rx.try_recv().is_ok());
		assert!(delta_rx.try_recv().is_ok());
	}

	#[tokio::test]
	async fn remove_device_publishes_a_tombstone() {
		let mut registry = ForwardRegistry::new();
		let (ttx, mut trx) = tokio::sync::mpsc::channel(10);
		registry.register_tombstone(DataKind::Device, ttx);
		let cache = Cache::new(Arc::new(registry));

		cache.device("HBLL-205-D1").await;
		cache.remove_device("HBLL-205-D1").await;

		assert_eq!(trx.try_recv().unwrap(), "HBLL-205-D1");
	}

	#[tokio::test]
	async fn remove_room_publishes_a_tombstone() {
		let mut registry = ForwardRegistry::new();
		let (ttx, mut trx) = tokio::sync::mpsc::channel(10);
		registry.register_tombstone(DataKind::Room, ttx);
		let cache = Cache::new(Arc::new(registry));

		cache.room("HBLL-205").await;
		cache.remove_room("HBLL-205").await;

		assert_eq!(trx.try_recv().unwrap(), "HBLL-205");
	}
}
