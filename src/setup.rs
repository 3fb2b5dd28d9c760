//! Builds the pipeline's collaborators from configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use thermo_config::{Config, DestinationConfig, DestinationKind, RemoteConfig, RemoteKind};
use thermo_pipeline::{Context, Layout, RetryPolicy};
use thermo_remote::ConnectorHandle;
use thermo_remote::backend::{LocalConnector, ReadOnlyConnector};
use thermo_storage::backend::{LocalStore, ReadOnlyStore};
use thermo_storage::{ObjectKey, StoreHandle};

const DEFAULT_REGION: &str = "us-east-1";

/// The destination store, wrapped read-only during a dry run.
pub async fn store(config: &Config) -> Result<StoreHandle> {
    let destination = &config.destination;
    let store: StoreHandle = match destination.kind {
        DestinationKind::S3 => s3_store(destination).await?,
        DestinationKind::Local => {
            let Some(path) = &destination.path else {
                exn::bail!(ErrorKind::Setup("destination path"));
            };
            let root = std::path::absolute(path).or_raise(|| ErrorKind::Setup("destination path"))?;
            Arc::new(LocalStore::new("destination", root).or_raise(|| ErrorKind::Setup("local destination"))?)
        },
    };
    if config.dry_run {
        tracing::info!("Dry run: the destination will not be written to");
        return Ok(Arc::new(ReadOnlyStore::new(store)));
    }
    Ok(store)
}

#[cfg(feature = "s3")]
async fn s3_store(destination: &DestinationConfig) -> Result<StoreHandle> {
    use thermo_storage::backend::{S3Settings, S3Store};

    let (Some(bucket), Some(key_id), Some(key_secret)) =
        (&destination.bucket, &destination.key_id, &destination.key_secret)
    else {
        exn::bail!(ErrorKind::Setup("S3 bucket and credentials"));
    };
    let settings = S3Settings {
        bucket: bucket.clone(),
        prefix: destination.prefix.clone().filter(|prefix| !prefix.is_empty()),
        region: destination.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string()),
        endpoint: destination.endpoint.clone(),
        key_id: key_id.clone(),
        key_secret: key_secret.clone(),
        session_token: destination.session_token.clone(),
    };
    let store = S3Store::new("destination", settings).await.or_raise(|| ErrorKind::Setup("S3 destination"))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "s3"))]
async fn s3_store(_: &DestinationConfig) -> Result<StoreHandle> {
    exn::bail!(ErrorKind::Setup("S3 destination (built without the `s3` feature)"))
}

/// The remote connector, wrapped read-only during a dry run.
pub fn connector(config: &Config) -> Result<ConnectorHandle> {
    let remote = &config.remote;
    let connector: ConnectorHandle = match remote.kind {
        RemoteKind::Ftp => ftp_connector(remote)?,
        RemoteKind::Local => Arc::new(LocalConnector::new("drop", &remote.root)),
    };
    if config.dry_run {
        tracing::info!("Dry run: nothing will be deleted from the remote server");
        return Ok(Arc::new(ReadOnlyConnector::new(connector)));
    }
    Ok(connector)
}

#[cfg(feature = "ftp")]
fn ftp_connector(remote: &RemoteConfig) -> Result<ConnectorHandle> {
    use thermo_remote::backend::{FtpConnector, FtpSettings};

    let Some(host) = &remote.host else {
        exn::bail!(ErrorKind::Setup("FTP host"));
    };
    let settings = FtpSettings {
        host: host.clone(),
        port: remote.port,
        username: remote.username.clone(),
        password: remote.password.clone(),
        root: remote.root.clone(),
        timeout: remote.timeout(),
    };
    Ok(Arc::new(FtpConnector::new(host.clone(), settings)))
}

#[cfg(not(feature = "ftp"))]
fn ftp_connector(_: &RemoteConfig) -> Result<ConnectorHandle> {
    exn::bail!(ErrorKind::Setup("FTP remote (built without the `ftp` feature)"))
}

/// Run context; creates the staging folder if needed.
pub fn context(config: &Config) -> Result<Context> {
    let staging_dir = config.staging_dir();
    std::fs::create_dir_all(&staging_dir).or_raise(|| ErrorKind::Setup("staging folder"))?;
    let checkpoint_key = ObjectKey::new(&config.checkpoint_key).or_raise(|| ErrorKind::Setup("checkpoint key"))?;
    Ok(Context {
        layout: Layout {
            image_dir: config.layout.image_dir.clone(),
            image_extension: config.layout.image_extension.clone(),
            measurement_extension: config.layout.measurement_extension.clone(),
        },
        batch_size: config.batch_size,
        staging_dir,
        checkpoint_key,
    })
}

pub fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy { max_attempts: config.connect.max_attempts, base_delay: config.connect.base_delay() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use thermo_config::Site;
    use thermo_remote::{Connector, RemotePath, RemoteSession};
    use thermo_storage::ObjectStore;

    fn local_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.sites = vec![Site::new("north")].into();
        config.remote.kind = RemoteKind::Local;
        config.remote.root = root.join("drop").display().to_string();
        config.destination.kind = DestinationKind::Local;
        config.destination.path = Some(root.join("bucket"));
        config.staging_dir = Some(root.join("staging"));
        config
    }

    #[tokio::test]
    async fn test_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&local_config(dir.path())).await.unwrap();
        let key = ObjectKey::new("north/2024-01-01/reading.csv").unwrap();
        store.write(&key, b"t,v").await.unwrap();
        assert!(dir.path().join("bucket/north/2024-01-01/reading.csv").exists());
    }

    #[tokio::test]
    async fn test_dry_run_store_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.dry_run = true;
        let store = store(&config).await.unwrap();
        let key = ObjectKey::new("north/2024-01-01/reading.csv").unwrap();
        store.write(&key, b"t,v").await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_destination_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.destination.path = None;
        let err = store(&config).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Setup(_)));
    }

    #[tokio::test]
    async fn test_local_connector() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("drop/north/2024-01-01")).unwrap();
        let connector = connector(&local_config(dir.path())).unwrap();
        let session = connector.connect().await.ok().unwrap();
        let names = session.list(&RemotePath::from_segments(["north"]).unwrap()).await.unwrap();
        assert_eq!(names, vec!["2024-01-01"]);
    }

    #[cfg(feature = "ftp")]
    #[test]
    fn test_ftp_requires_host() {
        let mut config = Config::default();
        config.remote.host = None;
        assert!(matches!(&*connector(&config).err().unwrap(), ErrorKind::Setup("FTP host")));
    }

    #[test]
    fn test_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.batch_size = 5;
        config.connect.base_delay_ms = 250;
        let ctx = context(&config).unwrap();
        assert!(dir.path().join("staging").is_dir());
        assert_eq!(ctx.batch_size, 5);
        assert_eq!(ctx.checkpoint_key.as_str(), "state/ingest_checkpoint.json");
        assert_eq!(ctx.layout.image_dir, "thermal");
        assert_eq!(retry_policy(&config).base_delay, Duration::from_millis(250));
    }
}
