use thiserror::Error;

/// The caller-visible error taxonomy for the state model and merger.
///
/// `StaleWrite` is deliberately absent: a stale write is not an error, it is a
/// `(changed = false, ..)` result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
	#[error("invalid device or room ID: {0}")]
	InvalidId(String),

	#[error("cannot merge records with mismatched IDs: {existing} != {incoming}")]
	IdMismatch { existing: String, incoming: String },

	#[error("unknown field: {0}")]
	UnknownField(String),

	#[error("unsupported type for field {field}: {reason}")]
	UnsupportedType { field: String, reason: String },

	#[error("actor for {0} is no longer available")]
	ActorUnavailable(String),

	#[error("fatal configuration error: {0}")]
	ConfigFatal(String),
}
