//! Layered configuration.
//!
//! Values are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. the file named by `THERMO_CONFIG` (TOML, YAML or JSON by extension),
//! 3. the environment names of the scheduled function deployment (`FTP_HOST`,
//!    `S3_BUCKET`, `SITE_IDS`, the standard `AWS_*` credentials, ...),
//! 4. `THERMO_*` environment variables, nested with `__`
//!    (`THERMO_REMOTE__HOST`, `THERMO_BATCH_SIZE`).
//!
//! Nothing is cached globally: construct a [`ConfigHandle`] at startup and
//! pass it to whatever needs configuration.

pub mod error;
mod sites;

pub use crate::sites::{Site, Sites};
use crate::error::{ErrorKind, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::value::Uncased;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "THERMO_CONFIG";
const ENV_PREFIX: &str = "THERMO_";
const LEGACY_ENV: [(&str, &str); 12] = [
    ("FTP_HOST", "remote.host"),
    ("FTP_PORT", "remote.port"),
    ("FTP_USER", "remote.username"),
    ("FTP_PASS", "remote.password"),
    ("FTP_FOLDER", "remote.root"),
    ("S3_BUCKET", "destination.bucket"),
    ("S3_FOLDER", "destination.prefix"),
    ("SITE_IDS", "sites"),
    ("AWS_REGION", "destination.region"),
    ("AWS_ACCESS_KEY_ID", "destination.key_id"),
    ("AWS_SECRET_ACCESS_KEY", "destination.key_secret"),
    ("AWS_SESSION_TOKEN", "destination.session_token"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Ftp,
    /// A locally mounted folder.
    Local,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    S3,
    Local,
}

/// Where field devices drop their files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    pub host: Option<String>,
    pub port: u16,
    #[serde(deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(deserialize_with = "lenient_string")]
    pub password: String,
    /// Folder containing one sub-folder per site. A server path for FTP, a
    /// local directory for mounted folders.
    pub root: String,
    pub timeout_secs: u64,
}
impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::default(),
            host: None,
            port: 21,
            username: "anonymous".to_string(),
            password: String::new(),
            root: "/".to_string(),
            timeout_secs: 30,
        }
    }
}
impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where files are mirrored to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub kind: DestinationKind,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub session_token: Option<String>,
    /// Root directory for the local kind.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub max_attempts: u32,
    /// First backoff delay; doubled after every failed attempt.
    pub base_delay_ms: u64,
}
impl Default for ConnectConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 1000 }
    }
}
impl ConnectConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Shape of a date folder on the remote server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub image_dir: String,
    pub image_extension: String,
    pub measurement_extension: String,
}
impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            image_dir: "thermal".to_string(),
            image_extension: ".png".to_string(),
            measurement_extension: ".csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub destination: DestinationConfig,
    pub sites: Sites,
    pub checkpoint_key: String,
    /// Maximum number of past date folders visited per site and run.
    pub batch_size: usize,
    pub connect: ConnectConfig,
    pub layout: LayoutConfig,
    /// Falls back to the system temporary directory.
    pub staging_dir: Option<PathBuf>,
    /// Read and download, but never write to the destination or delete from
    /// the source.
    pub dry_run: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            destination: DestinationConfig::default(),
            sites: Sites::default(),
            checkpoint_key: "state/ingest_checkpoint.json".to_string(),
            batch_size: 2,
            connect: ConnectConfig::default(),
            layout: LayoutConfig::default(),
            staging_dir: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// All layers, read from the current process environment.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = std::env::var_os(CONFIG_FILE_ENV) {
            figment = merge_file(figment, Path::new(&file));
        }
        let legacy = Env::raw().only(&LEGACY_ENV.map(|(env, _)| env)).map(|key| {
            LEGACY_ENV
                .iter()
                .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
                .map_or_else(|| Uncased::from(key.as_str().to_string()), |(_, path)| Uncased::from(*path))
        });
        figment
            .merge(legacy)
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
    }

    /// Extract and validate.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            exn::bail!(ErrorKind::Invalid("no sites configured".to_string()));
        }
        if let Some(site) = self.sites.iter().find(|site| !is_segment(&site.id)) {
            exn::bail!(ErrorKind::Invalid(format!("site id {:?} is not a single folder name", site.id)));
        }
        if self.connect.max_attempts < 1 {
            exn::bail!(ErrorKind::Invalid("connect.max_attempts must be at least 1".to_string()));
        }
        if !is_segment(&self.layout.image_dir) {
            exn::bail!(ErrorKind::Invalid(format!("layout.image_dir {:?} is not a single folder name", self.layout.image_dir)));
        }
        if self.layout.image_extension.is_empty() || self.layout.measurement_extension.is_empty() {
            exn::bail!(ErrorKind::Invalid("file extensions must not be empty".to_string()));
        }
        if self.checkpoint_key.trim_matches('/').is_empty() {
            exn::bail!(ErrorKind::Invalid("checkpoint_key must not be empty".to_string()));
        }
        match self.remote.kind {
            RemoteKind::Ftp if self.remote.host.as_deref().is_none_or(str::is_empty) => {
                exn::bail!(ErrorKind::Invalid("remote.host is required for FTP".to_string()));
            },
            RemoteKind::Local if self.remote.root.is_empty() => {
                exn::bail!(ErrorKind::Invalid("remote.root is required for a local folder".to_string()));
            },
            _ => {},
        }
        match self.destination.kind {
            DestinationKind::S3 if self.destination.bucket.as_deref().is_none_or(str::is_empty) => {
                exn::bail!(ErrorKind::Invalid("destination.bucket is required for S3".to_string()));
            },
            DestinationKind::Local if self.destination.path.is_none() => {
                exn::bail!(ErrorKind::Invalid("destination.path is required for a local store".to_string()));
            },
            _ => {},
        }
        Ok(())
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn merge_file(figment: Figment, file: &Path) -> Figment {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
        Some("json") => figment.merge(Json::file(file)),
        _ => figment.merge(Toml::file(file)),
    }
}

/// Environment values that look numeric (`FTP_PASS=1234`) arrive as numbers.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Signed(i64),
        Unsigned(u64),
        Float(f64),
        Flag(bool),
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Signed(n) => n.to_string(),
        Repr::Unsigned(n) => n.to_string(),
        Repr::Float(n) => n.to_string(),
        Repr::Flag(b) => b.to_string(),
    })
}

fn is_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Explicitly scoped, lazily extracted configuration.
///
/// The layers are rebuilt on every extraction, so [`reload()`](Self::reload)
/// picks up changes to the environment or the configuration file.
pub struct ConfigHandle {
    source: Box<dyn Fn() -> Figment + Send + Sync>,
    cached: RwLock<Option<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(source: impl Fn() -> Figment + Send + Sync + 'static) -> Self {
        Self { source: Box::new(source), cached: RwLock::new(None) }
    }

    /// Handle over the standard layers (see [`Config::figment`]).
    pub fn from_env() -> Self {
        Self::new(Config::figment)
    }

    /// The cached configuration, extracting it first if necessary.
    pub fn get(&self) -> Result<Arc<Config>> {
        if let Some(config) = self.cached.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(config));
        }
        let config = Arc::new(Config::from_figment(&(self.source)())?);
        tracing::debug!(sites = config.sites.len(), dry_run = config.dry_run, "Configuration loaded");
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Drop the cached configuration; the next [`get()`](Self::get) extracts again.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn reload(&self) -> Result<Arc<Config>> {
        self.invalidate();
        self.get()
    }
}
