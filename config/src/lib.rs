//! Operator configuration.
//!
//! Read from `$DOMINION_CONFIG` or `~/.dominion/config.toml`. String values may
//! reference environment variables as `${VAR}`; they are expanded before the
//! file is deserialized. The file is loaded at most once per process.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use dominion_types::{Address, ObjectId};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "DOMINION_CONFIG";
pub const NETWORK_ENV: &str = "DOMINION_ENV";
pub const DEFAULT_GAS_BUDGET: u64 = 2_000_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the config path (no home directory)")]
    NoPath,
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no network selected; set active_env, $DOMINION_ENV or --env")]
    NoNetworkSelected,
    #[error("network {name:?} is not configured (known: {known})")]
    UnknownNetwork { name: String, known: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DominionConfig {
    /// Network used when neither `--env` nor `$DOMINION_ENV` is given.
    pub active_env: Option<String>,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub crank: CrankConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Mirror logs to this file in addition to stderr. `~/` is expanded.
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrankConfig {
    /// Operator identity the signing gateway submits as.
    pub sender: Option<Address>,
    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,
}

impl Default for CrankConfig {
    fn default() -> Self {
        Self {
            sender: None,
            gas_budget: DEFAULT_GAS_BUDGET,
        }
    }
}

const fn default_gas_budget() -> u64 {
    DEFAULT_GAS_BUDGET
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Maximum ids per multi-get request.
    pub page_size: usize,
    /// Permit plain-HTTP endpoints.
    pub allow_http: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 2,
            page_size: 50,
            allow_http: false,
        }
    }
}

impl LedgerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Contract and endpoint addresses for one network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Signing gateway for batch submission; defaults to `rpc_url`.
    pub submit_url: Option<String>,
    pub governance_contract: ObjectId,
    pub dominion_contract: ObjectId,
    pub framework_commander_contract: ObjectId,
    /// The dominion registry the crank enumerates.
    pub registry: ObjectId,
}

/// Replace every `${VAR}` with the variable's value (empty if unset).
///
/// Unclosed `${` and empty `${}` are copied through.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            Some(end) => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn expand_value(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = expand_env_vars(s),
        toml::Value::Array(items) => items.iter_mut().for_each(expand_value),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| expand_value(v)),
        _ => {}
    }
}

/// `$DOMINION_CONFIG`, else `~/.dominion/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".dominion").join("config.toml"))
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

impl DominionConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().ok_or(ConfigError::NoPath)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&content, path)
    }

    /// Parse config text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let mut value = toml::Value::Table(toml::from_str(content).map_err(parse_error)?);
        expand_value(&mut value);
        value.try_into().map_err(parse_error)
    }

    /// Load once per process; later calls return the first result.
    pub fn shared(path: Option<&Path>) -> Result<&'static Self, ConfigError> {
        static CONFIG: OnceLock<DominionConfig> = OnceLock::new();
        if let Some(config) = CONFIG.get() {
            return Ok(config);
        }
        let loaded = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        Ok(CONFIG.get_or_init(|| loaded))
    }

    /// Resolve the active network: `explicit`, then `$DOMINION_ENV`, then `active_env`.
    pub fn network(&self, explicit: Option<&str>) -> Result<(&str, &NetworkConfig), ConfigError> {
        let from_env = env::var(NETWORK_ENV).ok();
        self.select_network(explicit, from_env.as_deref())
    }

    fn select_network(
        &self,
        explicit: Option<&str>,
        from_env: Option<&str>,
    ) -> Result<(&str, &NetworkConfig), ConfigError> {
        let name = explicit
            .or(from_env)
            .or(self.active_env.as_deref())
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigError::NoNetworkSelected)?;
        self.networks
            .get_key_value(name)
            .map(|(name, network)| (name.as_str(), network))
            .ok_or_else(|| ConfigError::UnknownNetwork {
                name: name.to_string(),
                known: self
                    .networks
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        self.app.log_file.as_deref().map(expand_home)
    }
}
