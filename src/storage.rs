use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::{S3Config, StorageConfig};

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// URL a client can fetch the object from.
    async fn object_url(&self, key: &str) -> anyhow::Result<String>;
}

pub async fn from_config(
    config: &StorageConfig,
    media_url: &str,
) -> anyhow::Result<std::sync::Arc<dyn StorageClient>> {
    Ok(match config {
        StorageConfig::Local { media_root } => {
            std::sync::Arc::new(LocalStorage::new(media_root.clone(), media_url))
        }
        StorageConfig::S3(s3) => std::sync::Arc::new(S3Storage::new(s3).await?),
    })
}

/// Files under a media root on the local disk, served back under `media_url`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    media_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, media_url: &str) -> Self {
        Self {
            root: root.into(),
            media_url: media_url.to_string(),
        }
    }

    /// Resolves a key below the media root, refusing anything that could escape it.
    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(key);
        anyhow::ensure!(
            rel.components().all(|c| matches!(c, Component::Normal(_))),
            "invalid storage key {key:?}"
        );
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(key, bytes = body.len(), "stored object on disk");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    async fn object_url(&self, key: &str) -> anyhow::Result<String> {
        Ok(format!("{}{}", self.media_url, key))
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    presign_seconds: u64,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            presign_seconds: cfg.presign_seconds,
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn object_url(&self, key: &str) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(self.presign_seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}
