use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;

use super::ObjectStore;
use crate::config::{Config, StorageConfig};
use crate::Result;

const MP3_CONTENT_TYPE: &str = "audio/mpeg";

/// S3 (or S3-compatible) bucket as the publishing target
pub struct S3Store {
    client: S3Client,
    storage: StorageConfig,
}

impl S3Store {
    /// Build a client from the ambient AWS credentials and the storage settings
    pub async fn new(config: &Config) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(config.aws_region())
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.storage.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            storage: config.storage.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, key: &str, body: tokio::fs::File) -> Result<String> {
        tracing::info!("Uploading audio to S3: s3://{}/{}", self.storage.bucket, key);

        let body = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .context("Failed to read audio file")?;

        let acl = self.storage.public_read.then_some(ObjectCannedAcl::PublicRead);

        self.client
            .put_object()
            .bucket(&self.storage.bucket)
            .key(key)
            .body(body)
            .content_type(MP3_CONTENT_TYPE)
            .set_acl(acl)
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(object_link(&self.storage, key))
    }
}

/// Public link for an uploaded key
pub fn object_link(storage: &StorageConfig, key: &str) -> String {
    let encoded_key = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if let Some(base) = &storage.public_base_url {
        return format!("{}/{}", base.trim_end_matches('/'), encoded_key);
    }

    match &storage.endpoint_url {
        Some(endpoint) => format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            storage.bucket,
            encoded_key
        ),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            storage.bucket, storage.region, encoded_key
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StorageConfig {
        let mut storage = Config::default().storage;
        storage.bucket = "songs".to_string();
        storage.region = "ap-southeast-1".to_string();
        storage
    }

    #[test]
    fn default_link_points_at_bucket() {
        assert_eq!(
            object_link(&storage(), "audio-relay/Song (Live).mp3"),
            "https://songs.s3.ap-southeast-1.amazonaws.com/audio-relay/Song%20%28Live%29.mp3"
        );
    }

    #[test]
    fn public_base_url_wins() {
        let mut storage = storage();
        storage.public_base_url = Some("https://cdn.example.com/".to_string());
        storage.endpoint_url = Some("http://minio:9000".to_string());

        assert_eq!(object_link(&storage, "Song.mp3"), "https://cdn.example.com/Song.mp3");
    }

    #[test]
    fn custom_endpoint_uses_path_style() {
        let mut storage = storage();
        storage.endpoint_url = Some("http://minio:9000".to_string());

        assert_eq!(object_link(&storage, "a/Song.mp3"), "http://minio:9000/songs/a/Song.mp3");
    }
}
