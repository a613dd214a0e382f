//! Bootstrap backfill (§4.9): before the worker pool starts, optionally replay a
//! prior snapshot into the cache so it is warm before the first live event.

use crate::cache::Cache;
use avforward_core::{CoreError, DeviceRecord, RoomRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Snapshot {
	#[serde(default)]
	pub devices: Vec<DeviceRecord>,
	#[serde(default)]
	pub rooms: Vec<RoomRecord>,
}

pub fn bootstrap_path() -> Option<std::path::PathBuf> {
	std::env::var("BOOTSTRAP_PATH").ok().map(|v| std::path::Path::new(&v).to_owned())
}

/// Reads `BOOTSTRAP_PATH` if set and seeds the cache with every device and room
/// record it contains. A no-op, not an error, when the variable is unset.
/// Returns the number of devices and rooms seeded.
pub async fn backfill(cache: &Cache) -> Result<(usize, usize), CoreError> {
	let Some(path) = bootstrap_path() else {
		return Ok((0, 0));
	};
	let text = std::fs::read_to_string(&path)
		.map_err(|err| CoreError::ConfigFatal(format!("cannot read bootstrap snapshot {}: {err}", path.display())))?;
	let snapshot: Snapshot = serde_json::from_str(&text)
		.map_err(|err| CoreError::ConfigFatal(format!("malformed bootstrap snapshot {}: {err}", path.display())))?;

	let device_count = snapshot.devices.len();
	let room_count = snapshot.rooms.len();
	for device in snapshot.devices {
		cache.seed_device(device).await;
	}
	for room in snapshot.rooms {
		cache.seed_room(room).await;
	}
	Ok((device_count, room_count))
}
