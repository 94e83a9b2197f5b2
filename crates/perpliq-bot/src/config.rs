//! Application configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use perpliq_core::accounts::DISCRIMINATOR_LEN;
use perpliq_core::programs::DEFAULT_PERPETUALS_PROGRAM_ID;
use perpliq_ledger::GatewayConfig;
use perpliq_liquidator::{DaemonConfig, ScannerConfig};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{AppError, AppResult};

/// Path tried when neither `--config` nor `PERPLIQ_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint of the ledger node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Liquidator keypair, Solana CLI JSON format. `~/` is expanded.
    #[serde(default = "default_keypair_path")]
    pub keypair_path: PathBuf,
    /// Admin keypairs in quorum order. Empty means the liquidator key alone.
    #[serde(default)]
    pub admin_keypair_paths: Vec<PathBuf>,
    /// Perpetuals program id (base58).
    #[serde(default = "default_program_id")]
    pub program_id: String,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8899".to_string()
}

fn default_keypair_path() -> PathBuf {
    PathBuf::from("~/.config/solana/id.json")
}

fn default_program_id() -> String {
    DEFAULT_PERPETUALS_PROGRAM_ID.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            keypair_path: default_keypair_path(),
            admin_keypair_paths: Vec::new(),
            program_id: default_program_id(),
            daemon: DaemonConfig::default(),
            gateway: GatewayConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Command-line flags take precedence over file values.
    pub fn apply_overrides(&mut self, rpc_url: Option<String>, keypair_path: Option<PathBuf>) {
        if let Some(url) = rpc_url {
            self.rpc_url = url;
        }
        if let Some(path) = keypair_path {
            self.keypair_path = path;
        }
    }

    pub fn program_id(&self) -> AppResult<Pubkey> {
        Pubkey::from_str(&self.program_id)
            .map_err(|e| AppError::Config(format!("invalid program_id {}: {e}", self.program_id)))
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "rpc_url must be http(s), got {}",
                self.rpc_url
            )));
        }
        self.program_id()?;
        self.gateway.validate().map_err(AppError::Config)?;
        if self.daemon.error_delay_ms == 0 {
            return Err(AppError::Config("daemon.error_delay_ms must be > 0".to_string()));
        }
        if self.scanner.position_data_size <= DISCRIMINATOR_LEN as u64 {
            return Err(AppError::Config(format!(
                "scanner.position_data_size must exceed {DISCRIMINATOR_LEN}"
            )));
        }
        Ok(())
    }

    /// Liquidator keypair path with `~/` expanded.
    #[must_use]
    pub fn keypair_path(&self) -> PathBuf {
        expand_home(&self.keypair_path)
    }

    /// Admin keypair paths with `~/` expanded, falling back to the
    /// liquidator key.
    #[must_use]
    pub fn admin_keypair_paths(&self) -> Vec<PathBuf> {
        if self.admin_keypair_paths.is_empty() {
            vec![self.keypair_path()]
        } else {
            self.admin_keypair_paths.iter().map(|p| expand_home(p)).collect()
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.program_id().unwrap(), DEFAULT_PERPETUALS_PROGRAM_ID);
        assert_eq!(config.daemon.liquidation_delay_ms, 5_000);
        assert_eq!(config.daemon.error_delay_ms, 10_000);
        assert_eq!(config.scanner.position_data_size, 234);
        config.validate().unwrap();
    }

    #[test]
    fn test_nested_sections() {
        let config = AppConfig::from_toml(
            r#"
            rpc_url = "https://api.devnet.solana.com"
            admin_keypair_paths = ["/keys/a.json", "/keys/b.json"]

            [daemon]
            liquidation_delay_ms = 1000

            [gateway]
            confirm_timeout_ms = 60000
            "#,
        )
        .unwrap();
        assert_eq!(config.daemon.liquidation_delay_ms, 1_000);
        assert_eq!(config.daemon.error_delay_ms, 10_000);
        assert_eq!(config.gateway.confirm_timeout_ms, 60_000);
        assert_eq!(
            config.admin_keypair_paths(),
            vec![PathBuf::from("/keys/a.json"), PathBuf::from("/keys/b.json")]
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig::from_toml(r#"rpc_url = "http://file:8899""#).unwrap();
        config.apply_overrides(Some("http://cli:8899".to_string()), None);
        assert_eq!(config.rpc_url, "http://cli:8899");
        assert_eq!(config.keypair_path, default_keypair_path());

        config.apply_overrides(None, Some(PathBuf::from("/tmp/k.json")));
        assert_eq!(config.rpc_url, "http://cli:8899");
        assert_eq!(config.keypair_path(), PathBuf::from("/tmp/k.json"));
    }

    #[test]
    fn test_admin_keys_fall_back_to_liquidator_key() {
        let mut config = AppConfig::default();
        config.keypair_path = PathBuf::from("/keys/liq.json");
        assert_eq!(config.admin_keypair_paths(), vec![PathBuf::from("/keys/liq.json")]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.program_id = "not-a-key".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.rpc_url = "ws://127.0.0.1:8900".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.daemon.error_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scanner.position_data_size = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_file_is_config_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/perpliq.toml")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
