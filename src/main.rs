use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod admin;
mod bootstrap;
mod cache;
mod config;
mod entity_actor;
mod forward_registry;
mod ingest;
mod interpreter;
mod periodic_pusher;
mod sinks;
mod worker_pool;

use cache::Cache;
use interpreter::Interpreter;
use ingest::source::{pump, ChannelEventSource};
use periodic_pusher::PeriodicPusher;
use worker_pool::WorkerPool;

/// Event-forwarding microservice for an AV control fleet.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
	#[arg(long, default_value_t = 8333)]
	port: u16,

	#[arg(long, default_value = "info")]
	log: String,
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let level = LevelFilter::from_str(&cli.log).unwrap_or(LevelFilter::Info);
	SimpleLogger::new().with_level(level).init().unwrap();

	let config_source = match config::source::resolve(config::config_path()) {
		Ok(source) => source,
		Err(err) => {
			log::error!("refusing to start: {err}");
			std::process::exit(1);
		}
	};
	let config_text = match config_source.load().await {
		Ok(text) => text,
		Err(err) => {
			log::error!("refusing to start: {err}");
			std::process::exit(1);
		}
	};
	let app_config = match config::parse(&config_text) {
		Ok(cfg) => cfg,
		Err(err) => {
			log::error!("refusing to start: {err}");
			std::process::exit(1);
		}
	};
	let stream_hub = sinks::broadcast::new_hub(sinks::broadcast::STREAM_HUB_CAPACITY);
	let forward = match config::build_registry(&app_config, stream_hub.clone()).await {
		Ok(registry) => Arc::new(registry),
		Err(err) => {
			log::error!("refusing to start: {err}");
			std::process::exit(1);
		}
	};

	let cache = Arc::new(Cache::new(forward.clone()));

	match bootstrap::backfill(&cache).await {
		Ok((devices, rooms)) => {
			if devices + rooms > 0 {
				log::info!("bootstrap replayed {devices} devices and {rooms} rooms");
			}
		}
		Err(err) => {
			log::error!("refusing to start: bootstrap backfill failed: {err}");
			std::process::exit(1);
		}
	}

	let interpreter = Arc::new(Interpreter::new(cache.clone(), forward.clone()));

	let (ingest_tx, ingest_rx) = WorkerPool::ingest_channel();
	let worker_pool = WorkerPool::spawn(worker_pool::DEFAULT_WORKERS, ingest_rx, interpreter);

	// Event bus subscriber stands in behind the `EventSource` seam (§4.9). Wire a
	// real transport in by swapping this for `WebSocketEventSource::connect(url)`;
	// the worker pool and interpreter only ever see the ingest channel.
	let (_bus_tx, bus_rx) = tokio::sync::mpsc::channel(1024);
	let source = Box::new(ChannelEventSource::new(bus_rx));
	tokio::spawn(pump(source, ingest_tx));

	let pusher_cancel = CancellationToken::new();
	let pusher = match PeriodicPusher::new(periodic_pusher::DEFAULT_SCHEDULE, cache.clone(), forward.clone()) {
		Ok(pusher) => pusher,
		Err(err) => {
			log::error!("refusing to start: invalid periodic pusher schedule: {err}");
			std::process::exit(1);
		}
	};
	let pusher_handle = pusher.spawn(pusher_cancel.clone());

	let app = admin::router(cache.clone(), stream_hub.clone());
	let addr = format!("0.0.0.0:{}", cli.port);
	let listener = match tokio::net::TcpListener::bind(&addr).await {
		Ok(listener) => listener,
		Err(err) => {
			log::error!("cannot bind admin surface to {addr}: {err}");
			std::process::exit(1);
		}
	};
	log::info!("admin surface listening on {addr}");

	let server = tokio::spawn(async move {
		if let Err(err) = axum::serve(listener, app).await {
			log::error!("admin server stopped: {err}");
		}
	});

	tokio::signal::ctrl_c().await.ok();
	log::info!("shutting down");
	pusher_cancel.cancel();
	worker_pool.cancel();
	worker_pool.wait().await;
	pusher_handle.abort();
	server.abort();
}
