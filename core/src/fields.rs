//! Explicit, compile-time field dispatch table.
//!
//! The upstream implementation resolves a JSON field name to a struct field via
//! runtime reflection. This redesign enumerates every writable field once: its
//! name, its kind, a reader, and a writer. `set_device_field`/`set_room_field`
//! look the name up in this table instead of reflecting over the record type.

use crate::error::CoreError;
use crate::record::{DeviceRecord, RoomRecord};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Str,
	Timestamp,
	OptBool,
	OptInt,
	OptFloat,
}

/// A value already coerced to a field's static kind, ready to compare against
/// the field's current value and (if different) write.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
	Str(String),
	Timestamp(DateTime<Utc>),
	OptBool(Option<bool>),
	OptInt(Option<i64>),
	OptFloat(Option<f64>),
}

use crate::value::FieldValue;

/// Coerces a runtime event value into the static kind a field declares, following
/// the fixed table in the spec: string fields accept only strings (no numeric or
/// boolean stringification), while bool/int/float fields also accept a string that
/// parses cleanly into the target kind. Timestamp fields accept only a timestamp.
pub fn coerce(value: &FieldValue, kind: FieldKind) -> Result<CoercedValue, String> {
	match kind {
		FieldKind::Str => match value {
			FieldValue::String(s) => Ok(CoercedValue::Str(s.clone())),
			other => Err(format!("cannot assign {other:?} to a string field")),
		},
		FieldKind::Timestamp => match value {
			FieldValue::Timestamp(t) => Ok(CoercedValue::Timestamp(*t)),
			other => Err(format!("cannot assign {other:?} to a timestamp field")),
		},
		FieldKind::OptBool => match value {
			FieldValue::Bool(b) => Ok(CoercedValue::OptBool(Some(*b))),
			FieldValue::String(s) if s == "true" => Ok(CoercedValue::OptBool(Some(true))),
			FieldValue::String(s) if s == "false" => Ok(CoercedValue::OptBool(Some(false))),
			other => Err(format!("cannot assign {other:?} to a bool field")),
		},
		FieldKind::OptInt => match value {
			FieldValue::Int(i) => Ok(CoercedValue::OptInt(Some(*i))),
			FieldValue::String(s) => s
				.parse::<i64>()
				.map(|i| CoercedValue::OptInt(Some(i)))
				.map_err(|_| format!("{s:?} does not parse as an int")),
			other => Err(format!("cannot assign {other:?} to an int field")),
		},
		FieldKind::OptFloat => match value {
			FieldValue::Float(f) => Ok(CoercedValue::OptFloat(Some(*f))),
			FieldValue::Int(i) => Ok(CoercedValue::OptFloat(Some(*i as f64))),
			FieldValue::String(s) => s
				.parse::<f64>()
				.map(|f| CoercedValue::OptFloat(Some(f)))
				.map_err(|_| format!("{s:?} does not parse as a float")),
			other => Err(format!("cannot assign {other:?} to a float field")),
		},
	}
}

struct DeviceFieldSpec {
	name: &'static str,
	kind: FieldKind,
	get: fn(&DeviceRecord) -> CoercedValue,
	set: fn(&mut DeviceRecord, CoercedValue),
}

macro_rules! str_field {
	($field:ident) => {
		(|d: &DeviceRecord| CoercedValue::Str(d.$field.clone())) as fn(&DeviceRecord) -> CoercedValue
	};
}

const DEVICE_FIELDS: &[DeviceFieldSpec] = &[
	DeviceFieldSpec {
		name: "control",
		kind: FieldKind::Str,
		get: str_field!(control),
		set: |d, v| {
			if let CoercedValue::Str(s) = v {
				d.control = s;
			}
		},
	},
	DeviceFieldSpec {
		name: "enable-notifications",
		kind: FieldKind::Str,
		get: str_field!(enable_notifications),
		set: |d, v| {
			if let CoercedValue::Str(s) = v {
				d.enable_notifications = s;
			}
		},
	},
	DeviceFieldSpec {
		name: "suppress-notifications",
		kind: FieldKind::Str,
		get: str_field!(suppress_notifications),
		set: |d, v| {
			if let CoercedValue::Str(s) = v {
				d.suppress_notifications = s;
			}
		},
	},
	DeviceFieldSpec {
		name: "view-dashboard",
		kind: FieldKind::Str,
		get: str_field!(view_dashboard),
		set: |d, v| {
			if let CoercedValue::Str(s) = v {
				d.view_dashboard = s;
			}
		},
	},
	DeviceFieldSpec {
		name: "power",
		kind: FieldKind::Str,
		get: str_field!(power),
		set: |d, v| {
			if let CoercedValue::Str(s) = v {
				d.power = s;
			}
		},
	},
	DeviceFieldSpec {
		name: "input",
		kind: FieldKind::Str,
		get: str_field!(input),
		set: |d, v| {
			if let CoercedValue::Str(s) = v {
				d.input = s;
			}
		},
	},
	DeviceFieldSpec {
		name: "volume",
		kind: FieldKind::OptInt,
		get: |d| CoercedValue::OptInt(d.volume),
		set: |d, v| {
			if let CoercedValue::OptInt(i) = v {
				d.volume = i;
			}
		},
	},
	DeviceFieldSpec {
		name: "blanked",
		kind: FieldKind::OptBool,
		get: |d| CoercedValue::OptBool(d.blanked),
		set: |d, v| {
			if let CoercedValue::OptBool(b) = v {
				d.blanked = b;
			}
		},
	},
	DeviceFieldSpec {
		name: "muted",
		kind: FieldKind::OptBool,
		get: |d| CoercedValue::OptBool(d.muted),
		set: |d, v| {
			if let CoercedValue::OptBool(b) = v {
				d.muted = b;
			}
		},
	},
	DeviceFieldSpec {
		name: "temperature",
		kind: FieldKind::OptFloat,
		get: |d| CoercedValue::OptFloat(d.temperature),
		set: |d, v| {
			if let CoercedValue::OptFloat(f) = v {
				d.temperature = f;
			}
		},
	},
	DeviceFieldSpec {
		name: "last-heartbeat",
		kind: FieldKind::Timestamp,
		get: |d| CoercedValue::Timestamp(d.last_heartbeat),
		set: |d, v| {
			if let CoercedValue::Timestamp(t) = v {
				d.last_heartbeat = t;
			}
		},
	},
	DeviceFieldSpec {
		name: "last-health-success",
		kind: FieldKind::Timestamp,
		get: |d| CoercedValue::Timestamp(d.last_health_success),
		set: |d, v| {
			if let CoercedValue::Timestamp(t) = v {
				d.last_health_success = t;
			}
		},
	},
];

fn find_device_field(key: &str) -> Option<&'static DeviceFieldSpec> {
	DEVICE_FIELDS.iter().find(|f| f.name == key)
}

/// Names of every field reachable through `set_device_field`, for callers that need
/// to diff two snapshots field-by-field (see `merge::compare_devices`).
pub fn device_field_names() -> impl Iterator<Item = &'static str> {
	DEVICE_FIELDS.iter().map(|f| f.name)
}

pub fn device_field_value(record: &DeviceRecord, name: &str) -> Option<CoercedValue> {
	find_device_field(name).map(|f| (f.get)(record))
}

/// Writes `value` into `record` without touching `update_times` or running the
/// stale-write check — used by `merge::merge_devices`, which drives those from the
/// two records being merged rather than from a single incoming write.
pub(crate) fn device_field_set_raw(record: &mut DeviceRecord, name: &str, value: CoercedValue) {
	if let Some(spec) = find_device_field(name) {
		(spec.set)(record, value);
	}
}

/// Applies a single timestamped field write to `record`, following §4.1 of the spec:
/// stale writes are a no-op (not an error), `alerts.<name>` keys are a whole-value
/// replacement that always counts as a change, and everything else goes through the
/// compile-time coercion table.
pub fn set_device_field(
	key: &str,
	value: &FieldValue,
	time: DateTime<Utc>,
	record: &mut DeviceRecord,
) -> Result<bool, CoreError> {
	if let Some(existing) = record.update_times.get(key) {
		if *existing > time {
			return Ok(false);
		}
	}

	if let Some(alert_name) = key.strip_prefix("alerts.") {
		let alert = value.as_alert().ok_or_else(|| CoreError::UnsupportedType {
			field: key.to_string(),
			reason: "alerts.* keys require an Alert value".to_string(),
		})?;
		record.alerts.insert(alert_name.to_string(), alert.clone());
		return Ok(true);
	}

	let spec = find_device_field(key).ok_or_else(|| CoreError::UnknownField(key.to_string()))?;
	let coerced = coerce(value, spec.kind).map_err(|reason| CoreError::UnsupportedType {
		field: key.to_string(),
		reason,
	})?;

	record.update_times.insert(key.to_string(), time);
	let previous = (spec.get)(record);
	if previous == coerced {
		return Ok(false);
	}
	(spec.set)(record, coerced);
	Ok(true)
}

struct RoomFieldSpec {
	name: &'static str,
	kind: FieldKind,
	get: fn(&RoomRecord) -> CoercedValue,
	set: fn(&mut RoomRecord, CoercedValue),
}

const ROOM_FIELDS: &[RoomFieldSpec] = &[RoomFieldSpec {
	name: "maintenance-mode",
	kind: FieldKind::OptBool,
	get: |r| CoercedValue::OptBool(r.maintenance_mode),
	set: |r, v| {
		if let CoercedValue::OptBool(b) = v {
			r.maintenance_mode = b;
		}
	},
}];

fn find_room_field(key: &str) -> Option<&'static RoomFieldSpec> {
	ROOM_FIELDS.iter().find(|f| f.name == key)
}

pub fn room_field_names() -> impl Iterator<Item = &'static str> {
	ROOM_FIELDS.iter().map(|f| f.name)
}

pub fn room_field_value(record: &RoomRecord, name: &str) -> Option<CoercedValue> {
	find_room_field(name).map(|f| (f.get)(record))
}

pub(crate) fn room_field_set_raw(record: &mut RoomRecord, name: &str, value: CoercedValue) {
	if let Some(spec) = find_room_field(name) {
		(spec.set)(record, value);
	}
}

/// Room analogue of `set_device_field`. Rooms carry no alerts.
pub fn set_room_field(
	key: &str,
	value: &FieldValue,
	time: DateTime<Utc>,
	record: &mut RoomRecord,
) -> Result<bool, CoreError> {
	if let Some(existing) = record.update_times.get(key) {
		if *existing > time {
			return Ok(false);
		}
	}

	let spec = find_room_field(key).ok_or_else(|| CoreError::UnknownField(key.to_string()))?;
	let coerced = coerce(value, spec.kind).map_err(|reason| CoreError::UnsupportedType {
		field: key.to_string(),
		reason,
	})?;

	record.update_times.insert(key.to_string(), time);
	let previous = (spec.get)(record);
	if previous == coerced {
		return Ok(false);
	}
	(spec.set)(record, coerced);
	Ok(true)
}
