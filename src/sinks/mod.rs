pub mod backend;
pub mod broadcast;
pub mod document_store;
pub mod index_name;
pub mod log_ingest;
pub mod static_entity;
pub mod timeseries;

use crate::forward_registry::ForwardDoc;
use serde_json::Value;

/// Renders a forwarded document to the generic JSON shape every sink backend
/// speaks. Wire-format adapters past this point are out of scope (§1).
pub fn doc_to_value(doc: &ForwardDoc) -> Value {
	match doc {
		ForwardDoc::Event(e) => serde_json::to_value(e),
		ForwardDoc::Device(d) => serde_json::to_value(d),
		ForwardDoc::Room(r) => serde_json::to_value(r),
	}
	.unwrap_or(Value::Null)
}

/// The coalescing/upsert key for a document: a device or room's own ID. Events
/// carry no natural entity ID; callers that need one for an event stream should
/// not route it through an upsert-keyed sink.
pub fn doc_entity_id(doc: &ForwardDoc) -> Option<String> {
	match doc {
		ForwardDoc::Event(_) => None,
		ForwardDoc::Device(d) => Some(d.device_id.clone()),
		ForwardDoc::Room(r) => Some(r.room_id.clone()),
	}
}
