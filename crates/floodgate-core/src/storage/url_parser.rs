//! URL parsing for storage backends.

use object_store::path::Path;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{GcsConfig, LocalConfig, S3Config};

static S3_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$")
        .expect("static S3 pattern is valid")
});
static S3_ENDPOINT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[sS]3[aA]?::(?P<protocol>https?)://(?P<endpoint>[^:/]+):(?P<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$",
    )
    .expect("static S3 endpoint pattern is valid")
});
static GCS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+))?$")
        .expect("static GCS pattern is valid")
});
static LOCAL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(file://|file:)?(?P<path>/.*)$").expect("static local pattern is valid")
});

const MEMORY_URL: &str = "memory://";

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Gcs(GcsConfig),
    Local(LocalConfig),
    /// Process-local store; contents vanish with the process.
    Memory,
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        if url == MEMORY_URL {
            return Ok(BackendConfig::Memory);
        }
        if let Some(caps) = S3_ENDPOINT_URL.captures(url) {
            return Ok(Self::parse_s3(&caps));
        }
        if let Some(caps) = S3_URL.captures(url) {
            return Ok(Self::parse_s3(&caps));
        }
        if let Some(caps) = GCS_URL.captures(url) {
            return Ok(BackendConfig::Gcs(GcsConfig {
                bucket: caps["bucket"].to_string(),
                key: key_of(&caps),
            }));
        }
        if let Some(caps) = LOCAL_PATH.captures(url) {
            let path = caps["path"].trim_end_matches('/');
            return Ok(BackendConfig::Local(LocalConfig {
                path: if path.is_empty() { "/" } else { path }.to_string(),
            }));
        }

        InvalidUrlSnafu { url }.fail()
    }

    fn parse_s3(caps: &Captures) -> Self {
        let region = std::env::var("AWS_DEFAULT_REGION").ok();

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            caps.name("endpoint").map(|endpoint| {
                let protocol = caps.name("protocol").map_or("https", |p| p.as_str());
                let port = caps.name("port").map_or("443", |p| p.as_str());
                format!("{protocol}://{}:{port}", endpoint.as_str())
            })
        });

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket: caps["bucket"].to_string(),
            key: key_of(caps),
        })
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::Local(_) | BackendConfig::Memory => None,
        }
    }
}

fn key_of(caps: &Captures) -> Option<Path> {
    caps.name("key").map(|k| Path::from(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://mybucket/path/to/data").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("path/to/data")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_s3_endpoint_url() {
        let config =
            BackendConfig::parse_url("s3::http://localhost:9000/mybucket/path/to/data").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                if std::env::var("AWS_ENDPOINT").is_err() {
                    assert_eq!(s3.endpoint, Some("http://localhost:9000".to_string()));
                }
                assert_eq!(s3.key, Some(Path::from("path/to/data")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_gcs_url_without_key() {
        let config = BackendConfig::parse_url("gs://mybucket").unwrap();
        assert_eq!(
            config,
            BackendConfig::Gcs(GcsConfig {
                bucket: "mybucket".to_string(),
                key: None,
            })
        );
    }

    #[test]
    fn test_local_forms() {
        for url in ["/data/out/", "file:///data/out", "file:/data/out"] {
            let config = BackendConfig::parse_url(url).unwrap();
            assert_eq!(
                config,
                BackendConfig::Local(LocalConfig {
                    path: "/data/out".to_string(),
                }),
                "url: {url}"
            );
        }
    }

    #[test]
    fn test_memory_url() {
        assert_eq!(
            BackendConfig::parse_url("memory://").unwrap(),
            BackendConfig::Memory
        );
    }

    #[test]
    fn test_invalid_url() {
        let result = BackendConfig::parse_url("relative/path");
        assert!(matches!(result, Err(StorageError::InvalidUrl { .. })));
    }
}
