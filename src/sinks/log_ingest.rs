//! Log-ingest sink (§4.6.5): size+time double-bounded. Flushes on whichever of the
//! ticker or the buffer-length threshold fires first.

use crate::forward_registry::ForwardDoc;
use crate::sinks::backend::SinkBackend;
use crate::sinks::doc_to_value;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const INCOMING_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
struct LogRecord {
	timestamp_ms: i64,
	timezone: String,
	payload: serde_json::Value,
}

fn to_log_record(doc: &ForwardDoc, timezone: &str) -> LogRecord {
	let timestamp_ms = match doc {
		ForwardDoc::Event(e) => e.timestamp.timestamp_millis(),
		_ => Utc::now().timestamp_millis(),
	};
	LogRecord {
		timestamp_ms,
		timezone: timezone.to_string(),
		payload: doc_to_value(doc),
	}
}

pub struct LogIngestSink {
	rx: mpsc::Receiver<ForwardDoc>,
	backend: Arc<dyn SinkBackend>,
	url: String,
	token: String,
	timezone: String,
	flush_interval: Duration,
	buffer_size: usize,
	buffer: Vec<LogRecord>,
}

impl LogIngestSink {
	pub fn channel() -> (mpsc::Sender<ForwardDoc>, mpsc::Receiver<ForwardDoc>) {
		mpsc::channel(INCOMING_CAPACITY)
	}

	#[allow(clippy::too_many_arguments)]
	pub fn spawn(
		rx: mpsc::Receiver<ForwardDoc>,
		backend: Arc<dyn SinkBackend>,
		url: impl Into<String>,
		token: impl Into<String>,
		timezone: impl Into<String>,
		flush_interval: Duration,
		buffer_size: usize,
	) -> tokio::task::JoinHandle<()> {
		let sink = LogIngestSink {
			rx,
			backend,
			url: url.into(),
			token: token.into(),
			timezone: timezone.into(),
			flush_interval,
			buffer_size,
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
						Some(doc) => {
							self.buffer.push(to_log_record(&doc, &self.timezone));
							if self.buffer.len() >= self.buffer_size {
								self.flush().await;
							}
						}
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
		let count = batch.len();
		let body = match serde_json::to_vec(&batch) {
			Ok(body) => body,
			Err(err) => {
				log::warn!("log-ingest batch of {count} failed to serialize: {err}");
				return;
			}
		};
		if let Err(err) = self.backend.post_bearer(&self.url, &self.token, body).await {
			log::warn!("log-ingest flush of {count} records to {} dropped: {err}", self.url);
		}
	}
}
