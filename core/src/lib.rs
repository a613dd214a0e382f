pub mod error;
pub mod event;
pub mod fields;
pub mod ids;
pub mod merge;
pub mod record;
pub mod value;

pub use error::CoreError;
pub use event::{
	Event, State, TAG_CORE_STATE, TAG_DETAIL_STATE, TAG_HARDWARE_INFO, TAG_HEARTBEAT,
	TAG_USER_GENERATED,
};
pub use fields::{coerce, set_device_field, set_room_field, CoercedValue, FieldKind};
pub use ids::{
	building_id_of, device_type_for_suffix, is_well_formed_device_id, is_well_formed_room_id,
	parse_device_id, room_id_of, DeviceIdParts,
};
pub use merge::{
	apply_device_state, apply_room_state, compare_devices, compare_rooms, merge_devices, merge_rooms,
};
pub use record::{unset_timestamp, DeviceRecord, RoomRecord};
pub use value::{Alert, FieldValue};
