use crate::ids::parse_device_id;
use crate::value::Alert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A `DateTime` sentinel for timestamp fields that have never been written.
/// Distinct from `Option`-typed fields, which represent "unset" directly.
pub fn unset_timestamp() -> DateTime<Utc> {
	DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is a valid timestamp")
}

/// Identity and last-known state of an AV endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
	pub device_id: String,
	pub room_id: String,
	pub building_id: String,
	pub device_type: String,

	pub control: String,
	pub enable_notifications: String,
	pub suppress_notifications: String,
	pub view_dashboard: String,

	pub power: String,
	pub input: String,
	pub volume: Option<i64>,
	pub blanked: Option<bool>,
	pub muted: Option<bool>,
	pub temperature: Option<f64>,

	pub last_heartbeat: DateTime<Utc>,
	pub last_health_success: DateTime<Utc>,

	/// Stamped directly by the interpreter's tag rules; never routed through
	/// `set_device_field`, so it carries no `update_times` entry.
	pub last_user_input: Option<DateTime<Utc>>,
	/// Stamped directly by the interpreter's tag rules; see `last_user_input`.
	pub last_state_received: Option<DateTime<Utc>>,

	pub update_times: HashMap<String, DateTime<Utc>>,
	pub alerts: HashMap<String, Alert>,
}

impl DeviceRecord {
	/// The default record created the first time an unknown device ID is referenced.
	pub fn new(device_id: &str) -> Self {
		let parts = parse_device_id(device_id);
		DeviceRecord {
			device_id: device_id.to_string(),
			room_id: parts.room_id,
			building_id: parts.building,
			device_type: parts.device_type,
			control: device_id.to_string(),
			enable_notifications: device_id.to_string(),
			suppress_notifications: device_id.to_string(),
			view_dashboard: device_id.to_string(),
			power: String::new(),
			input: String::new(),
			volume: None,
			blanked: None,
			muted: None,
			temperature: None,
			last_heartbeat: unset_timestamp(),
			last_health_success: unset_timestamp(),
			last_user_input: None,
			last_state_received: None,
			update_times: HashMap::new(),
			alerts: HashMap::new(),
		}
	}
}

/// Identity and aggregated state of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
	pub room_id: String,
	pub building_id: String,
	pub maintenance_mode: Option<bool>,
	pub update_times: HashMap<String, DateTime<Utc>>,
}

impl RoomRecord {
	pub fn new(room_id: &str) -> Self {
		let building_id = room_id.split('-').next().unwrap_or(room_id).to_string();
		RoomRecord {
			room_id: room_id.to_string(),
			building_id,
			maintenance_mode: None,
			update_times: HashMap::new(),
		}
	}
}
