//! Where the configuration document comes from (§4.9, a thin collaborator in the
//! `EventSource` mold): the core only needs *something* that produces the raw
//! JSON text. `CONFIG_SOURCE=s3` swaps the default local-file read for an
//! object-storage fetch; everything downstream (`parse`, `build_registry`) is
//! unaware of which one ran.

use async_trait::async_trait;
use avforward_core::CoreError;

#[async_trait]
pub trait ConfigSource: Send {
	/// Returns the raw configuration document text, or a `ConfigFatal` describing
	/// why it could not be retrieved.
	async fn load(&self) -> Result<String, CoreError>;
}

/// Reads the document from a local path. The default source.
pub struct LocalFileConfigSource {
	path: std::path::PathBuf,
}

impl LocalFileConfigSource {
	pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
		LocalFileConfigSource { path: path.into() }
	}
}

#[async_trait]
impl ConfigSource for LocalFileConfigSource {
	async fn load(&self) -> Result<String, CoreError> {
		std::fs::read_to_string(&self.path)
			.map_err(|err| CoreError::ConfigFatal(format!("cannot read configuration at {}: {err}", self.path.display())))
	}
}

/// Fetches the document from an S3 object, using the standard AWS credential
/// environment variables via `aws-config`'s default provider chain.
pub struct S3ConfigSource {
	bucket: String,
	key: String,
}

impl S3ConfigSource {
	pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
		S3ConfigSource {
			bucket: bucket.into(),
			key: key.into(),
		}
	}
}

#[async_trait]
impl ConfigSource for S3ConfigSource {
	async fn load(&self) -> Result<String, CoreError> {
		let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
		let client = aws_sdk_s3::Client::new(&shared_config);

		let output = client
			.get_object()
			.bucket(&self.bucket)
			.key(&self.key)
			.send()
			.await
			.map_err(|err| CoreError::ConfigFatal(format!("cannot fetch s3://{}/{}: {err}", self.bucket, self.key)))?;

		let bytes = output
			.body
			.collect()
			.await
			.map_err(|err| CoreError::ConfigFatal(format!("cannot read s3://{}/{} body: {err}", self.bucket, self.key)))?
			.into_bytes();

		String::from_utf8(bytes.to_vec())
			.map_err(|err| CoreError::ConfigFatal(format!("s3://{}/{} is not valid utf-8: {err}", self.bucket, self.key)))
	}
}

/// Picks the configuration source named by `CONFIG_SOURCE` (`local`, the default,
/// or `s3`, which additionally requires `CONFIG_BUCKET`/`CONFIG_KEY`).
pub fn resolve(config_path: std::path::PathBuf) -> Result<Box<dyn ConfigSource>, CoreError> {
	match std::env::var("CONFIG_SOURCE").unwrap_or_else(|_| "local".to_string()).as_str() {
		"s3" => {
			let bucket = std::env::var("CONFIG_BUCKET")
				.map_err(|_| CoreError::ConfigFatal("CONFIG_SOURCE=s3 requires CONFIG_BUCKET".to_string()))?;
			let key = std::env::var("CONFIG_KEY")
				.map_err(|_| CoreError::ConfigFatal("CONFIG_SOURCE=s3 requires CONFIG_KEY".to_string()))?;
			Ok(Box::new(S3ConfigSource::new(bucket, key)))
		}
		"local" => Ok(Box::new(LocalFileConfigSource::new(config_path))),
		other => Err(CoreError::ConfigFatal(format!("unknown CONFIG_SOURCE: {other}"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn local_source_reads_the_file_it_was_given() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		std::io::Write::write_all(&mut file, b"{\"caches\":[],\"forwarders\":[]}").unwrap();
		let source = LocalFileConfigSource::new(file.path());
		let text = source.load().await.unwrap();
		assert!(text.contains("caches"));
	}

	#[tokio::test]
	async fn missing_local_file_is_config_fatal() {
		let source = LocalFileConfigSource::new("/no/such/path/config.json");
		assert!(source.load().await.is_err());
	}

	#[test]
	fn resolve_defaults_to_local() {
		std::env::remove_var("CONFIG_SOURCE");
		let result = resolve(std::path::Path::new("./config.json").to_owned());
		assert!(result.is_ok());
	}

	#[test]
	fn s3_source_without_bucket_is_config_fatal() {
		std::env::set_var("CONFIG_SOURCE", "s3");
		std::env::remove_var("CONFIG_BUCKET");
		std::env::remove_var("CONFIG_KEY");
		let result = resolve(std::path::Path::new("./config.json").to_owned());
		assert!(result.is_err());
		std::env::remove_var("CONFIG_SOURCE");
	}

	#[test]
	fn unknown_config_source_is_config_fatal() {
		std::env::set_var("CONFIG_SOURCE", "ftp");
		let result = resolve(std::path::Path::new("./config.json").to_owned());
		assert!(result.is_err());
		std::env::remove_var("CONFIG_SOURCE");
	}
}
