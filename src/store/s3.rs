//! S3-backed object store.
//!
//! The AWS SDK is async; the rest of the crate is not. The gateway owns a
//! small tokio runtime and blocks on it for each call, so callers (the host
//! loop, thumbnail workers) see plain blocking functions.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;

use super::{ObjectEntry, ObjectStore, StoreError};
use crate::settings::StoreSettings;

const CREDENTIALS_SOURCE: &str = "pdfbucket-settings";
const RUNTIME_THREADS: usize = 2;

/// S3 implementation of [`ObjectStore`] for a single bucket.
pub struct S3Gateway {
    client: Client,
    bucket: String,
    runtime: Runtime,
}

impl S3Gateway {
    /// Build a gateway from store settings.
    ///
    /// Region and credentials fall back to the default AWS provider chain
    /// when the settings leave them unset.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, StoreError> {
        let bucket = settings
            .bucket
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| StoreError::Config("bucket name is missing".to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("pdfbucket-s3")
            .enable_all()
            .build()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key_id), Some(secret)) = (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                CREDENTIALS_SOURCE,
            ));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let shared = runtime.block_on(loader.load());
        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if settings.endpoint_url.is_some() {
            config = config.force_path_style(true);
        }
        let client = Client::from_conf(config.build());

        log::info!(
            "S3 gateway ready for bucket {bucket} (region {:?}, endpoint {:?})",
            settings.region,
            settings.endpoint_url
        );

        Ok(Self {
            client,
            bucket,
            runtime,
        })
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn request_error<E: std::error::Error>(operation: &'static str, error: E) -> StoreError {
    StoreError::request(operation, DisplayErrorContext(&error).to_string())
}

fn to_utc(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

impl ObjectStore for S3Gateway {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        self.runtime.block_on(async {
            let mut entries = Vec::new();
            let mut continuation: Option<String> = None;

            loop {
                let output = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix)
                    .set_continuation_token(continuation.take())
                    .send()
                    .await
                    .map_err(|e| request_error("list", e))?;

                for object in output.contents() {
                    let Some(key) = object.key() else {
                        continue;
                    };
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size: u64::try_from(object.size().unwrap_or(0)).unwrap_or(0),
                        last_modified: object
                            .last_modified()
                            .and_then(to_utc)
                            .unwrap_or_default(),
                    });
                }

                match output.next_continuation_token() {
                    Some(token) if output.is_truncated().unwrap_or(false) => {
                        continuation = Some(token.to_string());
                    }
                    _ => break,
                }
            }

            Ok(entries)
        })
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let config = PresigningConfig::expires_in(ttl).map_err(|e| request_error("presign", e))?;

        self.runtime.block_on(async {
            let request = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|e| request_error("presign", e))?;
            Ok(request.uri().to_string())
        })
    }

    fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(body))
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| request_error("put", e))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bucket_is_a_config_error() {
        let settings = StoreSettings::default();
        let err = S3Gateway::from_settings(&settings).err().unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn gateway_keeps_bucket_name() {
        let settings = StoreSettings {
            region: Some("us-east-1".to_string()),
            bucket: Some("test-bucket".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..StoreSettings::default()
        };
        let gateway = S3Gateway::from_settings(&settings).unwrap();
        assert_eq!(gateway.bucket(), "test-bucket");
    }

    #[test]
    fn presign_is_local_and_carries_expiry() {
        let settings = StoreSettings {
            region: Some("us-east-1".to_string()),
            bucket: Some("test-bucket".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..StoreSettings::default()
        };
        let gateway = S3Gateway::from_settings(&settings).unwrap();
        let url = gateway
            .presign("docs/a.pdf", Duration::from_secs(3600))
            .unwrap();
        assert!(url.contains("test-bucket"), "{url}");
        assert!(url.contains("X-Amz-Expires=3600"), "{url}");
    }
}
