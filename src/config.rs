use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub presign_seconds: u64,
}

/// Where uploaded media ends up.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    Local { media_root: PathBuf },
    S3(S3Config),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service against the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub media_url: String,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        let media_url = normalize_media_url(
            &std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".into()),
        );

        let storage = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageConfig::S3(S3Config {
                endpoint: std::env::var("S3_ENDPOINT")?,
                bucket: std::env::var("S3_BUCKET")?,
                access_key: std::env::var("S3_ACCESS_KEY")?,
                secret_key: std::env::var("S3_SECRET_KEY")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                presign_seconds: std::env::var("S3_PRESIGN_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30 * 60),
            }),
            Ok("local") | Err(_) => StorageConfig::Local {
                media_root: std::env::var("MEDIA_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./media")),
            },
            Ok(other) => anyhow::bail!("unknown STORAGE_BACKEND {other:?}"),
        };

        Ok(Self {
            database_url,
            host,
            port,
            media_url,
            storage,
        })
    }
}

fn normalize_media_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".into()
    } else {
        format!("/{}/", trimmed)
    }
}
