use crate::value::FieldValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TAG_CORE_STATE: &str = "core-state";
pub const TAG_DETAIL_STATE: &str = "detail-state";
pub const TAG_HEARTBEAT: &str = "heartbeat";
pub const TAG_USER_GENERATED: &str = "user-generated";
pub const TAG_HARDWARE_INFO: &str = "hardware-info";

pub fn has_tag(tags: &[String], tag: &str) -> bool {
	tags.iter().any(|t| t == tag)
}

pub fn has_any_tag(tags: &[String], candidates: &[&str]) -> bool {
	candidates.iter().any(|c| has_tag(tags, c))
}

/// A single field-level update derived from an `Event`, handed to an entity actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
	pub device_id: String,
	pub key: String,
	pub value: FieldValue,
	pub time: DateTime<Utc>,
	pub tags: Vec<String>,
}

/// The bus message consumed by the event interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	#[serde(default)]
	pub generating_system: String,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub tags: Vec<String>,
	pub target_device: String,
	#[serde(default)]
	pub affected_room: String,
	pub key: String,
	pub value: FieldValue,
	#[serde(default)]
	pub user: Option<String>,
	#[serde(default)]
	pub data: Option<String>,
}

impl Event {
	pub fn has_tag(&self, tag: &str) -> bool {
		has_tag(&self.tags, tag)
	}

	pub fn has_any_tag(&self, candidates: &[&str]) -> bool {
		has_any_tag(&self.tags, candidates)
	}
}
