use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mudnix_session::api::DEFAULT_BASE_URL;

// Three equivalent ways to configure:
//
//   config.toml:     [client]
//                    request_timeout_secs = 30
//
//   env var:         MUDNIX_CLIENT__REQUEST_TIMEOUT_SECS=30   (double underscore = nesting)
//
//   cli flag:        --base-url (server.base_url only)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// Where the game backend lives (`[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Client tuning knobs (`[client]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    /// Applies to one-shot requests only; push channels stay open.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the farewell logout.
    #[serde(default = "default_teardown_grace_ms")]
    pub teardown_grace_ms: u64,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            teardown_grace_ms: default_teardown_grace_ms(),
        }
    }
}

impl ClientFileConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_teardown_grace_ms() -> u64 {
    1500
}

/// Build a figment that layers: defaults → config.toml → MUDNIX_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `MUDNIX_SERVER__BASE_URL=http://localhost:3000`  →  `server.base_url`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("MUDNIX_").split("__"))
}

/// On-disk locations used by the client.
#[derive(Clone, Debug)]
pub struct MudnixConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl MudnixConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".mudnix"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self { data_dir, logs_dir })
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join("client.log")
    }

    pub fn load(&self) -> Result<FileConfig> {
        load_config(&self.data_dir)
            .extract()
            .with_context(|| format!("Invalid configuration in {:?}", self.data_dir))
    }
}
