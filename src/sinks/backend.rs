//! The boundary the spec draws around concrete sink wire formats: "the core only
//! requires: deliver a batch of documents under an index key." Each buffered
//! forwarder drives one of these trait methods; the HTTP implementation is the only
//! concrete backend, everything upstream of it is wire-format-agnostic.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Every outbound sink call carries this deadline (§5 "External HTTP calls carry a
/// 3 s per-request deadline").
pub const SINK_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct DocWrite {
	pub id: String,
	pub rev: Option<String>,
	pub body: Value,
}

#[derive(Debug, Clone)]
pub enum WriteOutcome {
	Ok { new_rev: String },
	Conflict,
	Error(String),
}

#[derive(Debug, Clone)]
pub struct WriteResult {
	pub id: String,
	pub outcome: WriteOutcome,
}

#[async_trait]
pub trait SinkBackend: Send + Sync {
	/// Append-only bulk insert; documents carry no caller-assigned ID.
	async fn bulk_index(&self, index: &str, docs: Vec<Value>) -> anyhow::Result<()>;

	/// Upsert by document ID.
	async fn bulk_upsert(&self, index: &str, docs: Vec<(String, Value)>) -> anyhow::Result<()>;

	/// Delete by document ID (tombstones).
	async fn bulk_delete(&self, index: &str, ids: Vec<String>) -> anyhow::Result<()>;

	/// Revision-tracked write used by the document-store sink; a conflict outcome
	/// means the caller must refetch the authoritative revision and retry.
	async fn bulk_write(&self, index: &str, docs: Vec<DocWrite>) -> anyhow::Result<Vec<WriteResult>>;

	/// Refetches the authoritative revision for the given IDs after a conflict.
	async fn bulk_get_rev(&self, index: &str, ids: Vec<String>) -> anyhow::Result<Vec<(String, Option<String>)>>;

	/// Single-document synchronous send, used by the broadcast sink.
	async fn send_one(&self, index: &str, doc: Value) -> anyhow::Result<()>;

	/// Posts a pre-serialized batch payload with a bearer token, used by the
	/// log-ingest sink.
	async fn post_bearer(&self, url: &str, token: &str, body: Vec<u8>) -> anyhow::Result<()>;
}

/// The one concrete backend: everything above goes out as an HTTP request against
/// a configured base URL, within `SINK_REQUEST_TIMEOUT`.
pub struct HttpBackend {
	client: reqwest::Client,
	base_url: String,
}

impl HttpBackend {
	pub fn new(base_url: impl Into<String>) -> Self {
		let client = reqwest::Client::builder()
			.timeout(SINK_REQUEST_TIMEOUT)
			.build()
			.expect("reqwest client builds with a sane default TLS backend");
		HttpBackend {
			client,
			base_url: base_url.into(),
		}
	}
}

#[async_trait]
impl SinkBackend for HttpBackend {
	async fn bulk_index(&self, index: &str, docs: Vec<Value>) -> anyhow::Result<()> {
		self.client
			.post(format!("{}/{}/_bulk_index", self.base_url, index))
			.json(&docs)
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}

	async fn bulk_upsert(&self, index: &str, docs: Vec<(String, Value)>) -> anyhow::Result<()> {
		self.client
			.post(format!("{}/{}/_bulk_upsert", self.base_url, index))
			.json(&docs)
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}

	async fn bulk_delete(&self, index: &str, ids: Vec<String>) -> anyhow::Result<()> {
		self.client
			.post(format!("{}/{}/_bulk_delete", self.base_url, index))
			.json(&ids)
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}

	async fn bulk_write(&self, index: &str, docs: Vec<DocWrite>) -> anyhow::Result<Vec<WriteResult>> {
		#[derive(serde::Serialize)]
		struct Req<'a> {
			id: &'a str,
			rev: &'a Option<String>,
			body: &'a Value,
		}
		let payload: Vec<Req> = docs
			.iter()
			.map(|d| Req {
				id: &d.id,
				rev: &d.rev,
				body: &d.body,
			})
			.collect();
		let resp = self
			.client
			.post(format!("{}/{}/_bulk_docs", self.base_url, index))
			.json(&payload)
			.send()
			.await?
			.error_for_status()?;
		let rows: Vec<serde_json::Value> = resp.json().await?;
		Ok(rows
			.into_iter()
			.zip(docs.iter())
			.map(|(row, doc)| WriteResult {
				id: doc.id.clone(),
				outcome: if let Some(rev) = row.get("rev").and_then(|v| v.as_str()) {
					WriteOutcome::Ok {
						new_rev: rev.to_string(),
					}
				} else if row.get("error").and_then(|v| v.as_str()) == Some("conflict") {
					WriteOutcome::Conflict
				} else {
					WriteOutcome::Error(row.get("error").and_then(|v| v.as_str()).unwrap_or("unknown").to_string())
				},
			})
			.collect())
	}

	async fn bulk_get_rev(&self, index: &str, ids: Vec<String>) -> anyhow::Result<Vec<(String, Option<String>)>> {
		let resp = self
			.client
			.post(format!("{}/{}/_bulk_get", self.base_url, index))
			.json(&ids)
			.send()
			.await?
			.error_for_status()?;
		let rows: Vec<serde_json::Value> = resp.json().await?;
		Ok(ids
			.into_iter()
			.zip(rows.into_iter())
			.map(|(id, row)| (id, row.get("rev").and_then(|v| v.as_str()).map(str::to_string)))
			.collect())
	}

	async fn send_one(&self, index: &str, doc: Value) -> anyhow::Result<()> {
		self.client
			.post(format!("{}/{}", self.base_url, index))
			.json(&doc)
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}

	async fn post_bearer(&self, url: &str, token: &str, body: Vec<u8>) -> anyhow::Result<()> {
		self.client
			.post(url)
			.bearer_auth(token)
			.header("content-type", "application/json")
			.body(body)
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}
}
