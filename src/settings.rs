use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pdf::RetryPolicy;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pdfbucket";
const ENV_PREFIX: &str = "PDFBUCKET_";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path:?} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("settings file {0:?} does not exist")]
    Missing(PathBuf),
}

/// Where documents live and how to reach them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    /// S3-compatible endpoint (MinIO, R2, ...). Implies path-style addressing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Width in pixels of the area the page is fitted into
    #[serde(default = "default_container_width")]
    pub container_width: f32,

    #[serde(default = "default_load_attempts")]
    pub load_attempts: u32,

    #[serde(default = "default_load_retry_delay_ms")]
    pub load_retry_delay_ms: u64,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            container_width: default_container_width(),
            load_attempts: default_load_attempts(),
            load_retry_delay_ms: default_load_retry_delay_ms(),
        }
    }
}

impl ViewerSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.load_attempts,
            Duration::from_millis(self.load_retry_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub viewer: ViewerSettings,

    #[serde(default = "default_thumbnail_workers")]
    pub thumbnail_workers: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_container_width() -> f32 {
    1000.0
}

fn default_load_attempts() -> u32 {
    RetryPolicy::DEFAULT_ATTEMPTS
}

fn default_load_retry_delay_ms() -> u64 {
    RetryPolicy::DEFAULT_DELAY.as_millis() as u64
}

fn default_thumbnail_workers() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            store: StoreSettings::default(),
            viewer: ViewerSettings::default(),
            thumbnail_workers: default_thumbnail_workers(),
            log_level: default_log_level(),
        }
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl Settings {
    /// Load settings from an explicit file, or from the per-user config file.
    ///
    /// An explicit path must exist. The per-user file is created with defaults
    /// on first run. Environment overrides are applied afterwards.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(SettingsError::Missing(path.to_path_buf()));
                }
                Self::load_from_path(path)?
            }
            None => match preferred_config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path)?,
                Some(path) => {
                    info!("Settings file not found, creating with defaults at {path:?}");
                    let settings = Self::default();
                    settings.save_to_file(&path);
                    settings
                }
                None => {
                    warn!("Could not determine config directory, using default settings");
                    Self::default()
                }
            },
        };

        settings.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::parse(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded settings from {path:?}");

        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
            settings.save_to_file(path);
        }

        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Apply `PDFBUCKET_*` variables on top of file values. Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(region) = var("REGION") {
            self.store.region = Some(region);
        }
        if let Some(bucket) = var("BUCKET") {
            self.store.bucket = Some(bucket);
        }
        if let Some(key_id) = var("ACCESS_KEY_ID") {
            self.store.access_key_id = Some(key_id);
        }
        if let Some(secret) = var("SECRET_ACCESS_KEY") {
            self.store.secret_access_key = Some(secret);
        }
        if let Some(endpoint) = var("ENDPOINT_URL") {
            self.store.endpoint_url = Some(endpoint);
        }
        if let Some(prefix) = var("PREFIX") {
            self.store.prefix = prefix;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            log::LevelFilter::Info
        })
    }

    fn save_to_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create config directory {parent:?}: {e}");
                    return;
                }
            }
        }

        let content = match serde_yaml::to_string(self) {
            Ok(yaml) => format!("{SETTINGS_HEADER}{yaml}"),
            Err(e) => {
                error!("Failed to serialize settings: {e}");
                return;
            }
        };

        match fs::write(path, content) {
            Ok(()) => debug!("Saved settings to {path:?}"),
            Err(e) => error!("Failed to save settings to {path:?}: {e}"),
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pdfbucket settings
# ============================================================================
# Store credentials can also come from the environment:
#   PDFBUCKET_REGION, PDFBUCKET_BUCKET, PDFBUCKET_ACCESS_KEY_ID,
#   PDFBUCKET_SECRET_ACCESS_KEY, PDFBUCKET_ENDPOINT_URL, PDFBUCKET_PREFIX
# Without explicit keys the default AWS credential chain is used.

"#;
