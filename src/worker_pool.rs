//! Bounded-concurrency worker pool (§4.7): a fixed number of workers share one
//! ingest channel; each runs the event interpreter to completion before pulling
//! the next event. Cancellation finishes the in-flight event and then exits.

use crate::interpreter::Interpreter;
use avforward_core::Event;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WORKERS: usize = 10;
pub const INGEST_CAPACITY: usize = 10_000;

pub struct WorkerPool {
	handles: Vec<tokio::task::JoinHandle<()>>,
	cancel: CancellationToken,
}

impl WorkerPool {
	pub fn ingest_channel() -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
		mpsc::channel(INGEST_CAPACITY)
	}

	/// Spawns `worker_count` workers sharing `rx`, running `interpreter` on every
	/// event until `rx` closes or `cancel` fires.
	pub fn spawn(worker_count: usize, rx: mpsc::Receiver<Event>, interpreter: Arc<Interpreter>) -> Self {
		let cancel = CancellationToken::new();
		let rx = Arc::new(Mutex::new(rx));
		let mut handles = Vec::with_capacity(worker_count);
		for id in 0..worker_count {
			let rx = rx.clone();
			let interpreter = interpreter.clone();
			let cancel = cancel.clone();
			handles.push(tokio::spawn(async move {
				worker_loop(id, rx, interpreter, cancel).await;
			}));
		}
		WorkerPool { handles, cancel }
	}

	/// Signals every worker to stop pulling new events once its current one finishes.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Waits for every worker to exit. Callers `await` this after `cancel()` or
	/// after closing the ingest channel's sending half.
	pub async fn wait(self) {
		for handle in self.handles {
			let _ = handle.await;
		}
	}
}

async fn worker_loop(
	id: usize,
	rx: Arc<Mutex<mpsc::Receiver<Event>>>,
	interpreter: Arc<Interpreter>,
	cancel: CancellationToken,
) {
	loop {
		if cancel.is_cancelled() {
			log::debug!("worker {id} stopping: cancellation requested");
			return;
		}
		let event = {
			let mut rx = rx.lock().await;
			tokio::select! {
				biased;
				_ = cancel.cancelled() => None,
				event = rx.recv() => event,
			}
		};
		let Some(event) = event else {
			log::debug!("worker {id} stopping: ingest channel closed");
			return;
		};
		if let Err(err) = interpreter.process(event).await {
			log::warn!("worker {id} failed to process event: {err}");
		}
	}
}
