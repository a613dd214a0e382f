//! Document-store sink (§4.6.3): revision-tracked upsert with conflict retry.
//! `cur_buffer` holds the latest payload per ID awaiting flush; `rev_buffer`
//! remembers the last revision seen for an ID so a fresh item can be seeded with
//! the right starting point instead of always attempting a blind create.

use crate::forward_registry::ForwardDoc;
use crate::sinks::backend::{DocWrite, SinkBackend, WriteOutcome};
use crate::sinks::{doc_entity_id, doc_to_value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const INCOMING_CAPACITY: usize = 10_000;

pub struct DocumentStoreSink {
	incoming_rx: mpsc::Receiver<ForwardDoc>,
	reingest_tx: mpsc::Sender<(String, serde_json::Value)>,
	reingest_rx: mpsc::Receiver<(String, serde_json::Value)>,
	backend: Arc<dyn SinkBackend>,
	index_name: String,
	flush_interval: Duration,
	cur_buffer: HashMap<String, DocWrite>,
	rev_buffer: HashMap<String, String>,
}

impl DocumentStoreSink {
	pub fn channel() -> (mpsc::Sender<ForwardDoc>, mpsc::Receiver<ForwardDoc>) {
		mpsc::channel(INCOMING_CAPACITY)
	}

	pub fn spawn(
		incoming_rx: mpsc::Receiver<ForwardDoc>,
		backend: Arc<dyn SinkBackend>,
		index_name: impl Into<String>,
		flush_interval: Duration,
	) -> tokio::task::JoinHandle<()> {
		let (reingest_tx, reingest_rx) = mpsc::channel(INCOMING_CAPACITY);
		let sink = DocumentStoreSink {
			incoming_rx,
			reingest_tx,
			reingest_rx,
			backend,
			index_name: index_name.into(),
			flush_interval,
			cur_buffer: HashMap::new(),
			rev_buffer: HashMap::new(),
		};
		tokio::spawn(sink.run())
	}

	async fn run(mut self) {
		let mut ticker = tokio::time::interval(self.flush_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				doc = self.incoming_rx.recv() => {
					match doc {
						Some(doc) => {
							if let Some(id) = doc_entity_id(&doc) {
								self.stage(id, doc_to_value(&doc));
							}
						}
						None => { self.flush().await; break; }
					}
				}
				reingested = self.reingest_rx.recv() => {
					if let Some((id, body)) = reingested {
						self.stage(id, body);
					}
				}
				_ = ticker.tick() => {
					self.flush().await;
				}
			}
		}
	}

	fn stage(&mut self, id: String, body: serde_json::Value) {
		if let Some(existing) = self.cur_buffer.get_mut(&id) {
			existing.body = body;
			return;
		}
		let rev = self.rev_buffer.get(&id).cloned();
		self.cur_buffer.insert(id.clone(), DocWrite { id, rev, body });
	}

	async fn flush(&mut self) {
		if self.cur_buffer.is_empty() {
			return;
		}
		let batch: Vec<DocWrite> = std::mem::take(&mut self.cur_buffer).into_values().collect();
		let bodies: HashMap<String, serde_json::Value> =
			batch.iter().map(|d| (d.id.clone(), d.body.clone())).collect();

		let results = match self.backend.bulk_write(&self.index_name, batch).await {
			Ok(results) => results,
			Err(err) => {
				log::warn!("document-store flush to {} failed outright: {err}", self.index_name);
				return;
			}
		};

		let mut conflicted = Vec::new();
		for result in results {
			match result.outcome {
				WriteOutcome::Ok { new_rev } => {
					self.rev_buffer.insert(result.id, new_rev);
				}
				WriteOutcome::Conflict => conflicted.push(result.id),
				WriteOutcome::Error(reason) => {
					log::warn!("document-store write for {} dropped: {reason}", result.id);
				}
			}
		}

		if conflicted.is_empty() {
			return;
		}
		match self.backend.bulk_get_rev(&self.index_name, conflicted.clone()).await {
			Ok(authoritative) => {
				for (id, rev) in authoritative {
					if let Some(rev) = rev {
						self.rev_buffer.insert(id.clone(), rev);
					}
					if let Some(body) = bodies.get(&id) {
						let _ = self.reingest_tx.send((id, body.clone())).await;
					}
				}
			}
			Err(err) => {
				log::warn!("document-store conflict refetch for {} failed: {err}", self.index_name);
			}
		}
	}
}
