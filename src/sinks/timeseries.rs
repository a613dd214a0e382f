//! Append-only time-series sink (§4.6.1): batch buffer is an ordered list, flushed
//! under a fresh rotated index name on every tick.

use crate::forward_registry::ForwardDoc;
use crate::sinks::backend::SinkBackend;
use crate::sinks::index_name::IndexNameFn;
use crate::sinks::doc_to_value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const INCOMING_CAPACITY: usize = 10_000;

pub struct TimeseriesSink {
	rx: mpsc::Receiver<ForwardDoc>,
	backend: Arc<dyn SinkBackend>,
	index: IndexNameFn,
	flush_interval: Duration,
	buffer: Vec<serde_json::Value>,
}

impl TimeseriesSink {
	pub fn channel() -> (mpsc::Sender<ForwardDoc>, mpsc::Receiver<ForwardDoc>) {
		mpsc::channel(INCOMING_CAPACITY)
	}

	pub fn spawn(
		rx: mpsc::Receiver<ForwardDoc>,
		backend: Arc<dyn SinkBackend>,
		index: IndexNameFn,
		flush_interval: Duration,
	) -> tokio::task::JoinHandle<()> {
		let sink = TimeseriesSink {
			rx,
			backend,
			index,
			flush_interval,
			buffer: Vec::new(),
		};
		tokio::spawn(sink.run())
	}

	async fn run(mut self) {
		let mut ticker = tokio::time::interval(self.flush_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				doc = self.rx.recv() => {
					match doc {
						Some(doc) => self.buffer.push(doc_to_value(&doc)),
						None => {
							self.flush().await;
							break;
						}
					}
				}
				_ = ticker.tick() => {
					self.flush().await;
				}
			}
		}
	}

	async fn flush(&mut self) {
		if self.buffer.is_empty() {
			return;
		}
		let batch = std::mem::take(&mut self.buffer);
		let index = self.index.now();
		let count = batch.len();
		if let Err(err) = self.backend.bulk_index(&index, batch).await {
			log::warn!("timeseries flush to {index} dropped {count} documents: {err}");
		}
	}
}
