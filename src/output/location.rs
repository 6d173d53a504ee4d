//! Output locations (local filesystem or S3-compatible object storage)
//!
//! The engine writes the files; this module answers the two questions the
//! engine cannot: "does this table location already hold data?" and "delete
//! everything under it". Remote roots go through `object_store`, local roots
//! through the filesystem.

use crate::config::StorageCredentials;
use crate::error::{Error, Result};
use crate::sql;
use crate::tables::Table;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Name of the single data file of an unpartitioned table
pub const UNPARTITIONED_FILE: &str = "data_0.parquet";

/// Object store schemes the engine session is configured for
pub const REMOTE_SCHEMES: &[&str] = &["s3", "s3a"];

/// Whether a location string names an object store rather than a local path
pub fn is_remote(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => !scheme.eq_ignore_ascii_case("file"),
        None => false,
    }
}

/// Reject remote locations whose scheme the pipeline cannot read or write
///
/// S3-compatible stores other than AWS (R2, MinIO) are addressed as `s3://`
/// together with a custom endpoint.
pub fn check_location(key: &str, location: &str) -> Result<()> {
    let Some((scheme, _)) = location.split_once("://") else {
        return Ok(());
    };
    let scheme = scheme.to_ascii_lowercase();
    if scheme == "file" || REMOTE_SCHEMES.contains(&scheme.as_str()) {
        return Ok(());
    }
    Err(Error::invalid_value(
        key,
        format!(
            "unsupported storage scheme '{scheme}' in '{location}' (expected {} or a local path)",
            REMOTE_SCHEMES.join("/")
        ),
    ))
}

#[derive(Debug, Clone)]
enum Backend {
    Local(PathBuf),
    Remote {
        store: Arc<dyn ObjectStore>,
        /// Key prefix inside the bucket/container
        prefix: String,
        /// `scheme://bucket` part, kept for engine-facing locations
        base_url: String,
    },
}

/// Root location under which every table directory is created
#[derive(Debug, Clone)]
pub struct OutputRoot {
    backend: Backend,
}

impl OutputRoot {
    /// Parse an output root
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` or `s3a://bucket/path/` - S3 and S3-compatible stores
    /// - `/local/path/`, `./path/` or `file:///path/` - Local filesystem
    pub fn parse(location: &str, credentials: Option<&StorageCredentials>) -> Result<Self> {
        check_location(crate::config::KEY_OUTPUT_PATH, location)?;
        if !is_remote(location) {
            return Ok(Self::local(location));
        }

        let url = Url::parse(location)?;
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config(format!("Missing bucket in output location: {location}")))?
            .to_string();
        let prefix = url.path().trim_matches('/').to_string();
        let scheme = url.scheme().to_ascii_lowercase();

        let store: Arc<dyn ObjectStore> = Arc::new(Self::build_s3(&bucket, credentials)?);

        Ok(Self {
            backend: Backend::Remote {
                store,
                prefix,
                base_url: format!("{scheme}://{bucket}"),
            },
        })
    }

    /// Local filesystem root
    pub fn local(path: impl Into<String>) -> Self {
        let path: String = path.into();
        let path = path.strip_prefix("file://").unwrap_or(&path).to_string();
        Self {
            backend: Backend::Local(PathBuf::from(path)),
        }
    }

    /// Build an S3 client from injected credentials
    fn build_s3(bucket: &str, credentials: Option<&StorageCredentials>) -> Result<impl ObjectStore> {
        let builder = match credentials {
            Some(creds) => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_access_key_id(&creds.access_key_id)
                    .with_secret_access_key(&creds.secret_access_key)
                    .with_region(&creds.region);
                if let Some(endpoint) = &creds.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                builder
            }
            None => AmazonS3Builder::from_env().with_bucket_name(bucket),
        };

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create S3 client: {e}")))
    }

    /// Whether the root lives in an object store
    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote { .. })
    }

    /// Local directory of the root, if it is local
    pub fn local_path(&self) -> Option<&std::path::Path> {
        match &self.backend {
            Backend::Local(path) => Some(path),
            Backend::Remote { .. } => None,
        }
    }

    /// Location of one table under this root
    pub fn table(&self, table: Table) -> TableTarget {
        let backend = match &self.backend {
            Backend::Local(root) => Backend::Local(root.join(table.name())),
            Backend::Remote {
                store,
                prefix,
                base_url,
            } => Backend::Remote {
                store: Arc::clone(store),
                prefix: sql::join_path(prefix, table.name()),
                base_url: base_url.clone(),
            },
        };
        TableTarget { table, backend }
    }
}

/// Directory (or key prefix) holding one table
#[derive(Debug, Clone)]
pub struct TableTarget {
    table: Table,
    backend: Backend,
}

impl TableTarget {
    /// Table written here
    pub fn table(&self) -> Table {
        self.table
    }

    /// Directory location as the engine addresses it
    pub fn location(&self) -> String {
        match &self.backend {
            Backend::Local(path) => path.display().to_string(),
            Backend::Remote {
                prefix, base_url, ..
            } => format!("{base_url}/{prefix}"),
        }
    }

    /// File the engine writes to for unpartitioned tables
    pub fn file_location(&self) -> String {
        sql::join_path(&self.location(), UNPARTITIONED_FILE)
    }

    /// Whether anything is stored under this target
    pub async fn exists(&self) -> Result<bool> {
        match &self.backend {
            Backend::Local(path) => match std::fs::read_dir(path) {
                Ok(mut entries) => Ok(entries.next().is_some()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            },
            Backend::Remote { store, prefix, .. } => {
                let prefix = ObjectPath::from(prefix.as_str());
                let first = store.list(Some(&prefix)).try_next().await?;
                Ok(first.is_some())
            }
        }
    }

    /// Delete everything under this target
    pub async fn clear(&self) -> Result<usize> {
        match &self.backend {
            Backend::Local(path) => {
                if !path.exists() {
                    return Ok(0);
                }
                let removed = count_files(path)?;
                std::fs::remove_dir_all(path)?;
                Ok(removed)
            }
            Backend::Remote { store, prefix, .. } => {
                let prefix = ObjectPath::from(prefix.as_str());
                let objects: Vec<_> = store.list(Some(&prefix)).try_collect().await?;
                for meta in &objects {
                    store.delete(&meta.location).await?;
                }
                Ok(objects.len())
            }
        }
    }

    /// Make the target writable for the engine
    ///
    /// The engine creates partition directories itself but expects the
    /// parent of a single output file to exist.
    pub fn prepare(&self) -> Result<()> {
        if let Backend::Local(path) = &self.backend {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }
}

fn count_files(dir: &std::path::Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += count_files(&entry.path())?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("s3://bucket/out/", true)]
    #[test_case("r2://bucket/out/", true)]
    #[test_case("gs://bucket", true)]
    #[test_case("file:///tmp/out", false)]
    #[test_case("/tmp/out", false)]
    #[test_case("./out", false)]
    fn test_is_remote(location: &str, expected: bool) {
        assert_eq!(is_remote(location), expected);
    }

    #[test]
    fn test_local_table_locations() {
        let root = OutputRoot::parse("file:///tmp/sparkify", None).unwrap();
        assert!(!root.is_remote());
        let songs = root.table(Table::Songs);
        assert_eq!(songs.location(), "/tmp/sparkify/songs");
        assert_eq!(
            root.table(Table::Users).file_location(),
            "/tmp/sparkify/users/data_0.parquet"
        );
    }

    #[test]
    fn test_s3_table_locations() {
        let creds = StorageCredentials::new("AKIAEXAMPLE", "secret");
        let root = OutputRoot::parse("s3://my-bucket/sparkify/", Some(&creds)).unwrap();
        assert!(root.is_remote());
        assert_eq!(
            root.table(Table::Time).location(),
            "s3://my-bucket/sparkify/time"
        );
        assert_eq!(
            root.table(Table::Artists).file_location(),
            "s3://my-bucket/sparkify/artists/data_0.parquet"
        );
    }

    #[test]
    fn test_s3_bucket_root() {
        let creds = StorageCredentials::new("AKIAEXAMPLE", "secret");
        let root = OutputRoot::parse("s3://my-bucket", Some(&creds)).unwrap();
        assert_eq!(root.table(Table::Songs).location(), "s3://my-bucket/songs");
    }

    #[test_case("ftp://host/path")]
    #[test_case("gs://bucket/out/")]
    #[test_case("az://container/out/")]
    #[test_case("r2://bucket/out/")]
    fn test_unsupported_scheme(location: &str) {
        let creds = StorageCredentials::new("AKIAEXAMPLE", "secret");
        let err = OutputRoot::parse(location, Some(&creds)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }), "{err}");
        assert!(err.is_config());
    }

    #[test_case("s3://bucket/out/")]
    #[test_case("S3A://bucket/out/")]
    #[test_case("file:///tmp/out")]
    #[test_case("/tmp/out")]
    fn test_supported_locations(location: &str) {
        assert!(check_location("S3_OUTPUT_PATH", location).is_ok());
    }

    #[tokio::test]
    async fn test_local_exists_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let root = OutputRoot::local(dir.path().to_str().unwrap());
        let target = root.table(Table::Songs);

        assert!(!target.exists().await.unwrap());

        target.prepare().unwrap();
        assert!(!target.exists().await.unwrap(), "empty dir holds no data");

        let partition = dir.path().join("songs/year=2000/artist_id=A1");
        std::fs::create_dir_all(&partition).unwrap();
        std::fs::write(partition.join("data_0.parquet"), b"x").unwrap();
        assert!(target.exists().await.unwrap());

        assert_eq!(target.clear().await.unwrap(), 1);
        assert!(!target.exists().await.unwrap());
        assert!(!dir.path().join("songs").exists());
    }
}
