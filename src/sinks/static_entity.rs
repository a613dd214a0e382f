//! Static-entity sink (§4.6.2): upsert-by-ID with a second tombstone inbox. Both
//! collapse within a flush window — a pending tombstone overrides any pending
//! upsert for the same ID.

use crate::forward_registry::ForwardDoc;
use crate::sinks::backend::SinkBackend;
use crate::sinks::{doc_entity_id, doc_to_value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const INCOMING_CAPACITY: usize = 10_000;

pub struct StaticEntitySink {
	upsert_rx: mpsc::Receiver<ForwardDoc>,
	tombstone_rx: mpsc::Receiver<String>,
	backend: Arc<dyn SinkBackend>,
	index_name: String,
	/// Document-ID-keyed upsert mode; when false, every upsert appends a fresh
	/// document instead of replacing by ID.
	upsert_by_id: bool,
	flush_interval: Duration,
	pending_upserts: HashMap<String, serde_json::Value>,
	pending_tombstones: std::collections::HashSet<String>,
}

impl StaticEntitySink {
	pub fn channels() -> (
		mpsc::Sender<ForwardDoc>,
		mpsc::Receiver<ForwardDoc>,
		mpsc::Sender<String>,
		mpsc::Receiver<String>,
	) {
		let (utx, urx) = mpsc::channel(INCOMING_CAPACITY);
		let (ttx, trx) = mpsc::channel(INCOMING_CAPACITY);
		(utx, urx, ttx, trx)
	}

	pub fn spawn(
		upsert_rx: mpsc::Receiver<ForwardDoc>,
		tombstone_rx: mpsc::Receiver<String>,
		backend: Arc<dyn SinkBackend>,
		index_name: impl Into<String>,
		upsert_by_id: bool,
		flush_interval: Duration,
	) -> tokio::task::JoinHandle<()> {
		let sink = StaticEntitySink {
			upsert_rx,
			tombstone_rx,
			backend,
			index_name: index_name.into(),
			upsert_by_id,
			flush_interval,
			pending_upserts: HashMap::new(),
			pending_tombstones: std::collections::HashSet::new(),
		};
		tokio::spawn(sink.run())
	}

	async fn run(mut self) {
		let mut ticker = tokio::time::interval(self.flush_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				doc = self.upsert_rx.recv() => {
					match doc {
						Some(doc) => self.stage_upsert(doc),
						None => { self.flush().await; break; }
					}
				}
				id = self.tombstone_rx.recv() => {
					match id {
						Some(id) => self.stage_tombstone(id),
						None => continue,
					}
				}
				_ = ticker.tick() => {
					self.flush().await;
				}
			}
		}
	}

	fn stage_upsert(&mut self, doc: ForwardDoc) {
		let id = doc_entity_id(&doc).unwrap_or_else(|| format!("anon-{}", self.pending_upserts.len()));
		self.pending_tombstones.remove(&id);
		self.pending_upserts.insert(id, doc_to_value(&doc));
	}

	fn stage_tombstone(&mut self, id: String) {
		self.pending_upserts.remove(&id);
		self.pending_tombstones.insert(id);
	}

	async fn flush(&mut self) {
		if !self.pending_upserts.is_empty() {
			let upserts: Vec<(String, serde_json::Value)> = std::mem::take(&mut self.pending_upserts).into_iter().collect();
			let count = upserts.len();
			let result = if self.upsert_by_id {
				self.backend.bulk_upsert(&self.index_name, upserts).await
			} else {
				self.backend
					.bulk_index(&self.index_name, upserts.into_iter().map(|(_, v)| v).collect())
					.await
			};
			if let Err(err) = result {
				log::warn!("static-entity flush to {} dropped {count} upserts: {err}", self.index_name);
			}
		}

		if !self.pending_tombstones.is_empty() {
			let tombstones: Vec<String> = std::mem::take(&mut self.pending_tombstones).into_iter().collect();
			let count = tombstones.len();
			if let Err(err) = self.backend.bulk_delete(&self.index_name, tombstones).await {
				log::warn!("static-entity flush to {} dropped {count} tombstones: {err}", self.index_name);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use avforward_core::DeviceRecord;
	use std::sync::Mutex;

	struct RecordingBackend {
		upserts: Mutex<Vec<(String, usize)>>,
		deletes: Mutex<Vec<(String, usize)>>,
	}

	#[async_trait]
	impl SinkBackend for RecordingBackend {
		async fn bulk_index(&self, _: &str, _: Vec<serde_json::Value>) -> anyhow::Result<()> {
			Ok(())
		}
		async fn bulk_upsert(&self, index: &str, docs: Vec<(String, serde_json::Value)>) -> anyhow::Result<()> {
			self.upserts.lock().unwrap().push((index.to_string(), docs.len()));
			Ok(())
		}
		async fn bulk_delete(&self, index: &str, ids: Vec<String>) -> anyhow::Result<()> {
			self.deletes.lock().unwrap().push((index.to_string(), ids.len()));
			Ok(())
		}
		async fn bulk_write(
			&self,
			_: &str,
			_: Vec<crate::sinks::backend::DocWrite>,
		) -> anyhow::Result<Vec<crate::sinks::backend::WriteResult>> {
			Ok(vec![])
		}
		async fn bulk_get_rev(&self, _: &str, _: Vec<String>) -> anyhow::Result<Vec<(String, Option<String>)>> {
			Ok(vec![])
		}
		async fn send_one(&self, _: &str, _: serde_json::Value) -> anyhow::Result<()> {
			Ok(())
		}
		async fn post_bearer(&self, _: &str, _: &str, _: Vec<u8>) -> anyhow::Result<()> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn repeated_upserts_for_same_id_coalesce() {
		let (utx, urx, _ttx, trx) = StaticEntitySink::channels();
		let backend = Arc::new(RecordingBackend {
			upserts: Mutex::new(Vec::new()),
			deletes: Mutex::new(Vec::new()),
		});
		let handle = StaticEntitySink::spawn(urx, trx, backend.clone(), "devices", true, Duration::from_millis(20));

		let mut a = DeviceRecord::new("HBLL-205-D1");
		a.power = "off".to_string();
		utx.send(ForwardDoc::Device(a)).await.unwrap();
		let mut b = DeviceRecord::new("HBLL-205-D1");
		b.power = "on".to_string();
		utx.send(ForwardDoc::Device(b)).await.unwrap();

		tokio::time::sleep(Duration::from_millis(60)).await;
		drop(utx);
		handle.await.unwrap();

		let upserts = backend.upserts.lock().unwrap();
		assert_eq!(upserts.len(), 1);
		assert_eq!(upserts[0].1, 1, "second write for the same ID coalesces into one upsert");
	}

	#[tokio::test]
	async fn tombstone_overrides_pending_upsert() {
		let (utx, urx, ttx, trx) = StaticEntitySink::channels();
		let backend = Arc::new(RecordingBackend {
			upserts: Mutex::new(Vec::new()),
			deletes: Mutex::new(Vec::new()),
		});
		let handle = StaticEntitySink::spawn(urx, trx, backend.clone(), "devices", true, Duration::from_millis(20));

		utx.send(ForwardDoc::Device(DeviceRecord::new("HBLL-205-D1"))).await.unwrap();
		ttx.send("HBLL-205-D1".to_string()).await.unwrap();

		tokio::time::sleep(Duration::from_millis(60)).await;
		drop(utx);
		drop(ttx);
		handle.await.unwrap();

		assert!(backend.upserts.lock().unwrap().is_empty());
		assert_eq!(backend.deletes.lock().unwrap().len(), 1);
	}
}
