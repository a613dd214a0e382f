//! Upstream event-bus subscriber (§1/§4.9, deliberately a thin collaborator): the
//! core only needs *something* that yields `Event` values one at a time. The
//! concrete bus client is out of scope; `EventSource` is the seam.

use async_trait::async_trait;
use avforward_core::Event;
use tokio::sync::mpsc;

#[async_trait]
pub trait EventSource: Send {
	/// Returns the next event, or `None` once the source is permanently exhausted.
	async fn next(&mut self) -> Option<Event>;
}

/// Wraps an `mpsc::Receiver<Event>` — the in-process source used by tests and by
/// anything that already has events arriving on a channel (e.g. the admin
/// surface's own diagnostics, or a future real bus client).
pub struct ChannelEventSource {
	rx: mpsc::Receiver<Event>,
}

impl ChannelEventSource {
	pub fn new(rx: mpsc::Receiver<Event>) -> Self {
		ChannelEventSource { rx }
	}
}

#[async_trait]
impl EventSource for ChannelEventSource {
	async fn next(&mut self) -> Option<Event> {
		self.rx.recv().await
	}
}

/// Connects to a configured bus URL and decodes newline-delimited JSON events.
/// A stub per the spec's scope boundary: it records where it would connect but
/// does not implement the wire protocol, so `next` always reports the source
/// exhausted. Swap in a real client without touching the worker pool or
/// interpreter, which only depend on the `EventSource` trait.
pub struct WebSocketEventSource {
	url: String,
}

impl WebSocketEventSource {
	pub fn connect(url: impl Into<String>) -> Self {
		WebSocketEventSource { url: url.into() }
	}
}

#[async_trait]
impl EventSource for WebSocketEventSource {
	async fn next(&mut self) -> Option<Event> {
		log::warn!("WebSocketEventSource({}) has no wire protocol implementation; reporting end of stream", self.url);
		None
	}
}

/// Pumps `source` into `tx` until the source is exhausted or `tx`'s receiver is
/// dropped. This is the glue `main` spawns between an `EventSource` and the
/// worker pool's ingest channel.
pub async fn pump(mut source: Box<dyn EventSource>, tx: mpsc::Sender<Event>) {
	while let Some(event) = source.next().await {
		if tx.send(event).await.is_err() {
			log::warn!("ingest channel closed; stopping event source pump");
			return;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use avforward_core::FieldValue;
	use chrono::Utc;

	fn sample_event() -> Event {
		Event {
			generating_system: String::new(),
			timestamp: Utc::now(),
			tags: vec![],
			target_device: "HBLL-205-D1".to_string(),
			affected_room: "HBLL-205".to_string(),
			key: "power".to_string(),
			value: FieldValue::from("on"),
			user: None,
			data: None,
		}
	}

	#[tokio::test]
	async fn channel_source_yields_until_closed() {
		let (tx, rx) = mpsc::channel(4);
		let mut source = ChannelEventSource::new(rx);
		tx.send(sample_event()).await.unwrap();
		drop(tx);

		assert!(source.next().await.is_some());
		assert!(source.next().await.is_none());
	}

	#[tokio::test]
	async fn websocket_stub_reports_exhausted_immediately() {
		let mut source = WebSocketEventSource::connect("wss://bus.example/events");
		assert!(source.next().await.is_none());
	}

	#[tokio::test]
	async fn pump_forwards_every_event_from_a_channel_source() {
		let (outer_tx, outer_rx) = mpsc::channel(4);
		let (inner_tx, mut inner_rx) = mpsc::channel(4);
		let source = ChannelEventSource::new(outer_rx);

		outer_tx.send(sample_event()).await.unwrap();
		drop(outer_tx);
		pump(Box::new(source), inner_tx).await;

		let received = inner_rx.recv().await.unwrap();
		assert_eq!(received.target_device, "HBLL-205-D1");
	}
}
