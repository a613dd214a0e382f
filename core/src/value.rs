use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An alert on a device: a whole-value replacement, never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
	pub message: String,
	pub alert_sent: Option<DateTime<Utc>>,
	pub alerting: bool,
	pub suppress: bool,
}

/// The runtime-typed value carried by an `Event` or a `State` update, before it is
/// coerced into a record field's static kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
	String(String),
	Timestamp(DateTime<Utc>),
	Bool(bool),
	Int(i64),
	Float(f64),
	Alert(Alert),
}

impl FieldValue {
	/// Case-insensitive comparison against a literal string, used for the
	/// `responsive == "ok"` rule in the event interpreter. Non-string values never match.
	pub fn eq_ignore_case(&self, other: &str) -> bool {
		matches!(self, FieldValue::String(s) if s.eq_ignore_ascii_case(other))
	}

	pub fn as_alert(&self) -> Option<&Alert> {
		match self {
			FieldValue::Alert(a) => Some(a),
			_ => None,
		}
	}
}

impl From<&str> for FieldValue {
	fn from(s: &str) -> Self {
		FieldValue::String(s.to_string())
	}
}

impl From<String> for FieldValue {
	fn from(s: String) -> Self {
		FieldValue::String(s)
	}
}

impl From<bool> for FieldValue {
	fn from(b: bool) -> Self {
		FieldValue::Bool(b)
	}
}
