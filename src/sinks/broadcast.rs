//! Broadcast sink (§4.6.4): forwards each incoming item to the HTTP admin
//! surface's `/api/v1/stream` websocket upgrade via a shared
//! `tokio::sync::broadcast` channel — the teacher's own fan-out idiom
//! (`Context::event_tx` in `context.rs`), generalized from one process-wide log
//! stream to one shared stream per process that every websocket client
//! subscribes to independently. No buffering: one document in, one publish out.

use crate::forward_registry::ForwardDoc;
use crate::sinks::doc_to_value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub const INCOMING_CAPACITY: usize = 10_000;

/// Default backlog for a fresh hub: how many unconsumed publishes a lagging
/// websocket subscriber may fall behind by before it starts missing messages.
pub const STREAM_HUB_CAPACITY: usize = 1024;

/// Fresh receivers see only documents published after they subscribed; this
/// mirrors a live tail, not a replay log.
pub fn new_hub(capacity: usize) -> Arc<broadcast::Sender<String>> {
	let (tx, _rx) = broadcast::channel(capacity);
	Arc::new(tx)
}

pub struct BroadcastSink {
	rx: mpsc::Receiver<ForwardDoc>,
	hub: Arc<broadcast::Sender<String>>,
	channel_name: String,
}

impl BroadcastSink {
	pub fn channel() -> (mpsc::Sender<ForwardDoc>, mpsc::Receiver<ForwardDoc>) {
		mpsc::channel(INCOMING_CAPACITY)
	}

	pub fn spawn(
		rx: mpsc::Receiver<ForwardDoc>,
		hub: Arc<broadcast::Sender<String>>,
		channel_name: impl Into<String>,
	) -> tokio::task::JoinHandle<()> {
		let sink = BroadcastSink {
			rx,
			hub,
			channel_name: channel_name.into(),
		};
		tokio::spawn(sink.run())
	}

	async fn run(mut self) {
		while let Some(doc) = self.rx.recv().await {
			let envelope = serde_json::json!({
				"channel": self.channel_name,
				"doc": doc_to_value(&doc),
			});
			// `send` errors only when there are no subscribers yet; that's not a
			// delivery failure worth logging above debug.
			if self.hub.send(envelope.to_string()).is_err() {
				log::debug!("broadcast on {} has no subscribers", self.channel_name);
			}
		}
	}
}
