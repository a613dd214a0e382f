//! One actor per device or room, mirroring the teacher's `subscribe_worker::Worker`
//! pattern: a task owns the record exclusively and serializes access to it over a
//! bounded channel, with the caller supplying its own reply channel per request.

use avforward_core::{
	apply_device_state, apply_room_state, merge_devices, merge_rooms, CoreError, DeviceRecord,
	RoomRecord, State,
};
use tokio::sync::{mpsc, oneshot};

const MAILBOX_CAPACITY: usize = 100;

fn unavailable(who: &str) -> CoreError {
	CoreError::ActorUnavailable(who.to_string())
}

pub enum DeviceMsg {
	Write {
		state: State,
		reply: oneshot::Sender<Result<bool, CoreError>>,
	},
	/// Merges a full incoming record per `CheckAndStoreDevice`'s field-by-field rules.
	Merge {
		incoming: DeviceRecord,
		reply: oneshot::Sender<Result<(DeviceRecord, bool), CoreError>>,
	},
	Read {
		reply: oneshot::Sender<DeviceRecord>,
	},
	Terminate,
}

#[derive(Debug, Clone)]
pub struct DeviceHandle {
	device_id: String,
	tx: mpsc::Sender<DeviceMsg>,
}

impl DeviceHandle {
	/// Spawns a fresh actor seeded with `DeviceRecord::new(device_id)` and returns a
	/// handle to it.
	pub fn spawn(device_id: &str) -> Self {
		Self::spawn_with(DeviceRecord::new(device_id))
	}

	/// Spawns an actor preloaded with `record`, used by the bootstrap backfill path.
	pub fn spawn_with(record: DeviceRecord) -> Self {
		let device_id = record.device_id.clone();
		let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
		tokio::spawn(DeviceActor { rx, record }.run());
		DeviceHandle { device_id, tx }
	}

	pub fn device_id(&self) -> &str {
		&self.device_id
	}

	pub async fn write(&self, state: State) -> Result<bool, CoreError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(DeviceMsg::Write {
				state,
				reply: reply_tx,
			})
			.await
			.map_err(|_| unavailable(&self.device_id))?;
		reply_rx.await.map_err(|_| unavailable(&self.device_id))?
	}

	pub async fn snapshot(&self) -> Result<DeviceRecord, CoreError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(DeviceMsg::Read { reply: reply_tx })
			.await
			.map_err(|_| unavailable(&self.device_id))?;
		reply_rx.await.map_err(|_| unavailable(&self.device_id))
	}

	pub async fn merge(&self, incoming: DeviceRecord) -> Result<(DeviceRecord, bool), CoreError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(DeviceMsg::Merge {
				incoming,
				reply: reply_tx,
			})
			.await
			.map_err(|_| unavailable(&self.device_id))?;
		reply_rx.await.map_err(|_| unavailable(&self.device_id))?
	}

	/// Best-effort: the actor may already be gone, which is not an error for a shutdown request.
	pub async fn terminate(&self) {
		let _ = self.tx.send(DeviceMsg::Terminate).await;
	}

	/// Non-blocking snapshot request used by the bounded-timeout "get all" sweep; the
	/// caller owns the reply channel and races it against its own deadline.
	pub fn request_snapshot(&self, reply: oneshot::Sender<DeviceRecord>) -> bool {
		self.tx.try_send(DeviceMsg::Read { reply }).is_ok()
	}
}

struct DeviceActor {
	rx: mpsc::Receiver<DeviceMsg>,
	record: DeviceRecord,
}

impl DeviceActor {
	async fn run(mut self) {
		while let Some(msg) = self.rx.recv().await {
			match msg {
				DeviceMsg::Write { state, reply } => {
					let result = apply_device_state(&state, &mut self.record);
					let _ = reply.send(result);
				}
				DeviceMsg::Merge { incoming, reply } => {
					let result = merge_devices(&self.record, &incoming).map(|(merged, changed)| {
						self.record = merged.clone();
						(merged, changed)
					});
					let _ = reply.send(result);
				}
				DeviceMsg::Read { reply } => {
					let _ = reply.send(self.record.clone());
				}
				DeviceMsg::Terminate => break,
			}
		}
	}
}

pub enum RoomMsg {
	Write {
		state: State,
		reply: oneshot::Sender<Result<bool, CoreError>>,
	},
	Merge {
		incoming: RoomRecord,
		reply: oneshot::Sender<Result<(RoomRecord, bool), CoreError>>,
	},
	Read {
		reply: oneshot::Sender<RoomRecord>,
	},
	Terminate,
}

#[derive(Debug, Clone)]
pub struct RoomHandle {
	room_id: String,
	tx: mpsc::Sender<RoomMsg>,
}

impl RoomHandle {
	pub fn spawn(room_id: &str) -> Self {
		Self::spawn_with(RoomRecord::new(room_id))
	}

	pub fn spawn_with(record: RoomRecord) -> Self {
		let room_id = record.room_id.clone();
		let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
		tokio::spawn(RoomActor { rx, record }.run());
		RoomHandle { room_id, tx }
	}

	pub fn room_id(&self) -> &str {
		&self.room_id
	}

	pub async fn write(&self, state: State) -> Result<bool, CoreError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(RoomMsg::Write {
				state,
				reply: reply_tx,
			})
			.await
			.map_err(|_| unavailable(&self.room_id))?;
		reply_rx.await.map_err(|_| unavailable(&self.room_id))?
	}

	pub async fn snapshot(&self) -> Result<RoomRecord, CoreError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(RoomMsg::Read { reply: reply_tx })
			.await
			.map_err(|_| unavailable(&self.room_id))?;
		reply_rx.await.map_err(|_| unavailable(&self.room_id))
	}

	pub async fn merge(&self, incoming: RoomRecord) -> Result<(RoomRecord, bool), CoreError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(RoomMsg::Merge {
				incoming,
				reply: reply_tx,
			})
			.await
			.map_err(|_| unavailable(&self.room_id))?;
		reply_rx.await.map_err(|_| unavailable(&self.room_id))?
	}

	pub async fn terminate(&self) {
		let _ = self.tx.send(RoomMsg::Terminate).await;
	}

	pub fn request_snapshot(&self, reply: oneshot::Sender<RoomRecord>) -> bool {
		self.tx.try_send(RoomMsg::Read { reply }).is_ok()
	}
}

struct RoomActor {
	rx: mpsc::Receiver<RoomMsg>,
	record: RoomRecord,
}

impl RoomActor {
	async fn run(mut self) {
		while let Some(msg) = self.rx.recv().await {
			match msg {
				RoomMsg::Write { state, reply } => {
					let result = apply_room_state(&state, &mut self.record);
					let _ = reply.send(result);
				}
				RoomMsg::Merge { incoming, reply } => {
					let result = merge_rooms(&self.record, &incoming).map(|(merged, changed)| {
						self.record = merged.clone();
						(merged, changed)
					});
					let _ = reply.send(result);
				}
				RoomMsg::Read { reply } => {
					let _ = reply.send(self.record.clone());
				}
				RoomMsg::Terminate => break,
			}
		}
	}
}
