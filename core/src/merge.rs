//! Event application and snapshot comparison.
//!
//! `apply_event` is the single entry point an entity actor calls on each
//! incoming `State`; it is a thin wrapper over `fields::set_device_field` /
//! `fields::set_room_field` that also maintains the two convenience
//! timestamp fields the dispatch table does not own. `compare_devices` /
//! `compare_rooms` diff two snapshots field-by-field, used by the bootstrap
//! seed path and by tests that assert on "what changed".

use crate::error::CoreError;
use crate::event::{has_any_tag, State, TAG_CORE_STATE, TAG_DETAIL_STATE, TAG_HEARTBEAT, TAG_USER_GENERATED};
use crate::fields::{self, device_field_names, room_field_names};
use crate::record::{DeviceRecord, RoomRecord};
use crate::value::FieldValue;

const RESPONSIVE_KEY: &str = "responsive";
const RESPONSIVE_OK: &str = "ok";
const LAST_HEARTBEAT: &str = "last-heartbeat";
const LAST_HEALTH_SUCCESS: &str = "last-health-success";

/// Applies one `State` update to `record`, returning whether it changed anything.
///
/// This is `EditDeviceFromEvent`'s dispatch: a `CoreState`-tagged update carrying a
/// blank string value is a deliberate no-op (the event has nothing to say), a
/// `responsive == "ok"` write stamps both heartbeat timestamps, any heartbeat-tagged
/// write stamps `last-heartbeat` alone, and everything else goes through the generic
/// field dispatch table. `last-user-input` and `last-state-received` are then stamped
/// directly from the event's tags — provenance of the write, not a value the event
/// itself carries — regardless of which branch above fired.
pub fn apply_device_state(state: &State, record: &mut DeviceRecord) -> Result<bool, CoreError> {
	if has_any_tag(&state.tags, &[TAG_CORE_STATE]) {
		if let FieldValue::String(s) = &state.value {
			if s.is_empty() {
				return Ok(false);
			}
		}
	}

	let changed = if state.key == RESPONSIVE_KEY && state.value.eq_ignore_case(RESPONSIVE_OK) {
		let a = fields::set_device_field(
			LAST_HEALTH_SUCCESS,
			&FieldValue::Timestamp(state.time),
			state.time,
			record,
		)?;
		let b = fields::set_device_field(
			LAST_HEARTBEAT,
			&FieldValue::Timestamp(state.time),
			state.time,
			record,
		)?;
		a || b
	} else if has_any_tag(&state.tags, &[TAG_HEARTBEAT]) {
		fields::set_device_field(
			LAST_HEARTBEAT,
			&FieldValue::Timestamp(state.time),
			state.time,
			record,
		)?
	} else {
		fields::set_device_field(&state.key, &state.value, state.time, record)?
	};

	if has_any_tag(&state.tags, &[TAG_USER_GENERATED]) {
		record.last_user_input = Some(state.time);
	}
	if has_any_tag(&state.tags, &[TAG_CORE_STATE, TAG_DETAIL_STATE]) {
		record.last_state_received = Some(state.time);
	}

	Ok(changed)
}

pub fn apply_room_state(state: &State, record: &mut RoomRecord) -> Result<bool, CoreError> {
	fields::set_room_field(&state.key, &state.value, state.time, record)
}

/// Merges a freshly-received full `incoming` record into `existing`, field by
/// field, keeping whichever side has the newer `update_times` entry (ties keep
/// `existing`). Alerts merge key-by-key; any differing value counts as a change.
/// Identity fields (`device_id`, `room_id`, `building_id`, `device_type`) and the
/// two tag-stamped convenience timestamps are never touched here — they travel
/// only through `apply_device_state`, the single-event path.
pub fn merge_devices(
	existing: &DeviceRecord,
	incoming: &DeviceRecord,
) -> Result<(DeviceRecord, bool), CoreError> {
	if existing.device_id != incoming.device_id {
		return Err(CoreError::IdMismatch {
			existing: existing.device_id.clone(),
			incoming: incoming.device_id.clone(),
		});
	}

	let mut merged = existing.clone();
	for name in device_field_names() {
		let existing_time = existing.update_times.get(name).copied();
		let incoming_time = incoming.update_times.get(name).copied();
		let take_incoming = match (existing_time, incoming_time) {
			(None, Some(_)) => true,
			(Some(_), None) | (None, None) => false,
			(Some(e), Some(i)) => i > e,
		};
		if take_incoming {
			if let Some(value) = fields::device_field_value(incoming, name) {
				fields::device_field_set_raw(&mut merged, name, value);
				merged
					.update_times
					.insert(name.to_string(), incoming_time.expect("checked above"));
			}
		}
	}

	for (alert_name, alert_value) in &incoming.alerts {
		if merged.alerts.get(alert_name) != Some(alert_value) {
			merged.alerts.insert(alert_name.clone(), alert_value.clone());
		}
	}

	let changed = merged != *existing;
	Ok((merged, changed))
}

/// Room analogue of `merge_devices`. Rooms carry no alerts.
pub fn merge_rooms(existing: &RoomRecord, incoming: &RoomRecord) -> Result<(RoomRecord, bool), CoreError> {
	if existing.room_id != incoming.room_id {
		return Err(CoreError::IdMismatch {
			existing: existing.room_id.clone(),
			incoming: incoming.room_id.clone(),
		});
	}

	let mut merged = existing.clone();
	for name in room_field_names() {
		let existing_time = existing.update_times.get(name).copied();
		let incoming_time = incoming.update_times.get(name).copied();
		let take_incoming = match (existing_time, incoming_time) {
			(None, Some(_)) => true,
			(Some(_), None) | (None, None) => false,
			(Some(e), Some(i)) => i > e,
		};
		if take_incoming {
			if let Some(value) = fields::room_field_value(incoming, name) {
				fields::room_field_set_raw(&mut merged, name, value);
				merged
					.update_times
					.insert(name.to_string(), incoming_time.expect("checked above"));
			}
		}
	}

	let changed = merged != *existing;
	Ok((merged, changed))
}

/// Names of every device field that differs between `old` and `new`, including
/// the identity fields and alerts, which the dispatch table does not track.
pub fn compare_devices(old: &DeviceRecord, new: &DeviceRecord) -> Vec<String> {
	let mut changed = Vec::new();

	for name in device_field_names() {
		if fields::device_field_value(old, name) != fields::device_field_value(new, name) {
			changed.push(name.to_string());
		}
	}

	if old.device_id != new.device_id {
		changed.push("device-id".to_string());
	}
	if old.room_id != new.room_id {
		changed.push("room-id".to_string());
	}
	if old.building_id != new.building_id {
		changed.push("building-id".to_string());
	}
	if old.device_type != new.device_type {
		changed.push("device-type".to_string());
	}
	if old.last_user_input != new.last_user_input {
		changed.push("last-user-input".to_string());
	}
	if old.last_state_received != new.last_state_received {
		changed.push("last-state-received".to_string());
	}
	if old.alerts != new.alerts {
		changed.push("alerts".to_string());
	}

	changed
}

pub fn compare_rooms(old: &RoomRecord, new: &RoomRecord) -> Vec<String> {
	let mut changed = Vec::new();

	for name in room_field_names() {
		if fields::room_field_value(old, name) != fields::room_field_value(new, name) {
			changed.push(name.to_string());
		}
	}

	if old.room_id != new.room_id {
		changed.push("room-id".to_string());
	}
	if old.building_id != new.building_id {
		changed.push("building-id".to_string());
	}

	changed
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::FieldValue;
	use chrono::{TimeZone, Utc};

	fn t(secs: i64) -> chrono::DateTime<Utc> {
		Utc.timestamp_opt(secs, 0).unwrap()
	}

	#[test]
	fn user_generated_state_stamps_last_user_input() {
		let mut d = DeviceRecord::new("HBLL-205-D1");
		let s = State {
			device_id: d.device_id.clone(),
			key: "power".to_string(),
			value: FieldValue::from("on"),
			time: t(10),
			tags: vec![
				TAG_USER_GENERATED.to_string(),
				crate::event::TAG_CORE_STATE.to_string(),
			],
		};
		assert!(apply_device_state(&s, &mut d).unwrap());
		assert_eq!(d.last_user_input, Some(t(10)));
		assert_eq!(d.last_state_received, Some(t(10)));
	}

	#[test]
	fn blank_core_state_value_is_a_noop() {
		let mut d = DeviceRecord::new("HBLL-205-D1");
		let s = State {
			device_id: d.device_id.clone(),
			key: "power".to_string(),
			value: FieldValue::from(""),
			time: t(10),
			tags: vec![TAG_CORE_STATE.to_string()],
		};
		assert!(!apply_device_state(&s, &mut d).unwrap());
		assert_eq!(d.power, "");
		assert_eq!(d.last_state_received, None, "a blank CoreState value must not stamp anything");
	}

	#[test]
	fn responsive_ok_stamps_both_heartbeat_fields() {
		let mut d = DeviceRecord::new("HBLL-205-D1");
		let s = State {
			device_id: d.device_id.clone(),
			key: "responsive".to_string(),
			value: FieldValue::from("OK"),
			time: t(10),
			tags: vec![TAG_HEARTBEAT.to_string()],
		};
		assert!(apply_device_state(&s, &mut d).unwrap());
		assert_eq!(d.last_heartbeat, t(10));
		assert_eq!(d.last_health_success, t(10));
	}

	#[test]
	fn heartbeat_state_does_not_touch_last_state_received() {
		let mut d = DeviceRecord::new("HBLL-205-D1");
		let s = State {
			device_id: d.device_id.clone(),
			key: "last-heartbeat".to_string(),
			value: FieldValue::Timestamp(t(10)),
			time: t(10),
			tags: vec![TAG_HEARTBEAT.to_string()],
		};
		apply_device_state(&s, &mut d).unwrap();
		assert_eq!(d.last_state_received, None);
	}

	#[test]
	fn compare_devices_reports_changed_field() {
		let a = DeviceRecord::new("HBLL-205-D1");
		let mut b = a.clone();
		b.power = "on".to_string();
		let diff = compare_devices(&a, &b);
		assert!(diff.contains(&"power".to_string()));
		assert_eq!(diff.len(), 1);
	}

	#[test]
	fn compare_devices_is_empty_for_identical_records() {
		let a = DeviceRecord::new("HBLL-205-D1");
		let b = a.clone();
		assert!(compare_devices(&a, &b).is_empty());
	}

	#[test]
	fn merge_devices_rejects_mismatched_ids() {
		let a = DeviceRecord::new("HBLL-205-D1");
		let b = DeviceRecord::new("HBLL-206-D1");
		assert!(matches!(
			merge_devices(&a, &b),
			Err(CoreError::IdMismatch { .. })
		));
	}

	#[test]
	fn merge_devices_prefers_newer_timestamp() {
		let mut a = DeviceRecord::new("HBLL-205-D1");
		a.power = "off".to_string();
		a.update_times.insert("power".to_string(), t(10));

		let mut b = a.clone();
		b.power = "on".to_string();
		b.update_times.insert("power".to_string(), t(20));

		let (merged, changed) = merge_devices(&a, &b).unwrap();
		assert!(changed);
		assert_eq!(merged.power, "on");
	}

	#[test]
	fn merge_devices_ties_keep_existing() {
		let mut a = DeviceRecord::new("HBLL-205-D1");
		a.power = "off".to_string();
		a.update_times.insert("power".to_string(), t(10));

		let mut b = a.clone();
		b.power = "on".to_string();
		// Same timestamp as `a` — a tie keeps the existing side.

		let (merged, changed) = merge_devices(&a, &b).unwrap();
		assert!(!changed);
		assert_eq!(merged.power, "off");
	}

	#[test]
	fn merge_devices_differing_alert_counts_as_change() {
		use crate::value::Alert;
		let a = DeviceRecord::new("HBLL-205-D1");
		let mut b = a.clone();
		b.alerts.insert(
			"lostPing".to_string(),
			Alert {
				message: "lost ping".to_string(),
				alert_sent: None,
				alerting: true,
				suppress: false,
			},
		);
		let (merged, changed) = merge_devices(&a, &b).unwrap();
		assert!(changed);
		assert!(merged.alerts.contains_key("lostPing"));
	}
}
