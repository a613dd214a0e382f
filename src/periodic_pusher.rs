//! Periodic pusher (§4.8): a cron-style scheduler invoking a full-device push —
//! snapshot every device and fan it out to `(device, DELTA)` then `(device, ALL)`.

use crate::cache::Cache;
use crate::forward_registry::{DataKind, EventKind, ForwardDoc, ForwardRegistry};
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SCHEDULE: &str = "0 0 0 * * *";

pub struct PeriodicPusher {
	schedule: Schedule,
	cache: Arc<Cache>,
	forward: Arc<ForwardRegistry>,
}

impl PeriodicPusher {
	pub fn new(cron_expr: &str, cache: Arc<Cache>, forward: Arc<ForwardRegistry>) -> anyhow::Result<Self> {
		let schedule = Schedule::from_str(cron_expr)?;
		Ok(PeriodicPusher {
			schedule,
			cache,
			forward,
		})
	}

	pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move { self.run(cancel).await })
	}

	async fn run(self, cancel: CancellationToken) {
		loop {
			let Some(next) = self.schedule.upcoming(Utc).next() else {
				log::warn!("periodic pusher schedule has no further fire times");
				return;
			};
			let now = Utc::now();
			let delay = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
			tokio::select! {
				_ = cancel.cancelled() => return,
				_ = tokio::time::sleep(delay) => {
					self.push_all().await;
				}
			}
		}
	}

	/// `GetAllDeviceRecords` then send every record to `(device, DELTA)` and
	/// `(device, ALL)`, in that order, per device. A send failure for one device
	/// does not abort the sweep.
	pub async fn push_all(&self) {
		let records = self.cache.all_devices().await;
		log::info!("periodic pusher sweeping {} devices", records.len());
		for record in records {
			self.forward
				.send(DataKind::Device, EventKind::Delta, ForwardDoc::Device(record.clone()))
				.await;
			self.forward
				.send(DataKind::Device, EventKind::All, ForwardDoc::Device(record))
				.await;
		}
	}
}
