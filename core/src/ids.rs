//! Device/room ID grammar (`BLDG-ROOM-TYPENN`) and the fixed prefix -> device-type table.

/// Prefix -> translated device-type name, in the order the spec lists them. Unknown
/// prefixes resolve to `"unknown"`.
const KNOWN_PREFIXES: &[(&str, &str)] = &[
	("D", "display"),
	("CP", "control-processor"),
	("DSP", "digital-signal-processor"),
	("DMPS", "dmps"),
	("PC", "computer"),
	("SW", "video-switcher"),
	("MICJK", "microphone-jack"),
	("SP", "scheduling-panel"),
	("MIC", "microphone"),
	("DS", "divider-sensor"),
	("GW", "gateway"),
	("VIA", "via"),
	("HDMI", "hdmi"),
	("RX", "receiver"),
	("TX", "transmitter"),
	("RCV", "microphone-reciever"),
	("EN", "encoder"),
	("LIN", "line-in"),
	("OF", "overflow"),
	("MEDIA", "media"),
	("TECLITE", "tec-lite"),
	("CUSTOM", "custom"),
	("SD", "tec-sd"),
];

/// Parsed pieces of a `BLDG-ROOM-TYPENN` device ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdParts {
	pub building: String,
	pub room_id: String,
	pub device_type: String,
}

/// Splits a device ID into building/room/device-type per the grammar in the spec.
///
/// A malformed ID (not exactly three hyphen-segments) still parses: `device_type` is empty
/// but `building`/`room_id` are derived from whatever segments exist, falling back to the
/// full ID when there aren't even two segments.
pub fn parse_device_id(id: &str) -> DeviceIdParts {
	let segments: Vec<&str> = id.split('-').collect();
	if segments.len() != 3 {
		let building = segments.first().copied().unwrap_or(id).to_string();
		let room_id = if segments.len() >= 2 {
			format!("{}-{}", segments[0], segments[1])
		} else {
			id.to_string()
		};
		return DeviceIdParts {
			building,
			room_id,
			device_type: String::new(),
		};
	}

	let building = segments[0].to_string();
	let room_id = format!("{}-{}", segments[0], segments[1]);
	let device_type = device_type_for_suffix(segments[2]);
	DeviceIdParts {
		building,
		room_id,
		device_type,
	}
}

/// Resolves the `TYPENN` suffix of a device ID against the known prefix table, returning
/// the translated device-type name (not the prefix itself).
pub fn device_type_for_suffix(suffix: &str) -> String {
	let prefix_len = suffix
		.chars()
		.take_while(|c| !c.is_ascii_digit())
		.count();
	let prefix = &suffix[..prefix_len];
	match KNOWN_PREFIXES.iter().find(|&(p, _)| *p == prefix) {
		Some((_, name)) => name.to_string(),
		None => "unknown".to_string(),
	}
}

/// `BLDG-ROOM` derived from a device ID, without validating the device-type suffix.
pub fn room_id_of(device_id: &str) -> String {
	parse_device_id(device_id).room_id
}

/// `BLDG` derived from a device ID.
pub fn building_id_of(device_id: &str) -> String {
	parse_device_id(device_id).building
}

/// True iff `device_id` has the `BLDG-ROOM-TYPENN` shape (three hyphen-segments).
pub fn is_well_formed_device_id(device_id: &str) -> bool {
	device_id.split('-').count() == 3
}

/// True iff `room_id` has the `BLDG-ROOM` shape (two hyphen-segments).
pub fn is_well_formed_room_id(room_id: &str) -> bool {
	room_id.split('-').count() == 2
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_known_prefix() {
		let parts = parse_device_id("HBLL-205-D1");
		assert_eq!(parts.building, "HBLL");
		assert_eq!(parts.room_id, "HBLL-205");
		assert_eq!(parts.device_type, "display");
	}

	#[test]
	fn unknown_prefix_is_unknown() {
		let parts = parse_device_id("HBLL-205-ZZ1");
		assert_eq!(parts.device_type, "unknown");
	}

	#[test]
	fn malformed_id_is_untyped() {
		let parts = parse_device_id("HBLL-205");
		assert_eq!(parts.device_type, "");
		assert_eq!(parts.room_id, "HBLL-205");
	}

	#[test]
	fn malformed_single_segment() {
		let parts = parse_device_id("HBLL");
		assert_eq!(parts.device_type, "");
		assert_eq!(parts.room_id, "HBLL");
		assert_eq!(parts.building, "HBLL");
	}

	#[test]
	fn multi_letter_prefix_resolves() {
		let parts = parse_device_id("HBLL-205-DMPS1");
		assert_eq!(parts.device_type, "dmps");
	}

	#[test]
	fn every_known_prefix_translates_to_a_distinct_name() {
		let cp = device_type_for_suffix("CP1");
		assert_eq!(cp, "control-processor");
		let mic = device_type_for_suffix("MIC1");
		assert_eq!(mic, "microphone");
		let micjk = device_type_for_suffix("MICJK1");
		assert_eq!(micjk, "microphone-jack");
		assert_ne!(cp, mic);
	}
}
