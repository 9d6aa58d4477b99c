use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "bioauth.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ledger_url: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub wallet_key_path: PathBuf,
    pub auto_connect_wallet: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_url: "sqlite://./data/bioauth.db".into(),
            contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".into(),
            chain_id: 31337,
            wallet_key_path: PathBuf::from("./data/wallet.key"),
            auto_connect_wallet: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    ledger_url: Option<String>,
    contract_address: Option<String>,
    chain_id: Option<u64>,
    wallet_key_path: Option<PathBuf>,
    auto_connect_wallet: Option<bool>,
}

/// Defaults, then the TOML file (explicit path or `bioauth.toml`), then environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if config_path.is_some() => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.ledger_url = normalize_ledger_url(&settings.ledger_url);
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.ledger_url {
        settings.ledger_url = v;
    }
    if let Some(v) = file_cfg.contract_address {
        settings.contract_address = v;
    }
    if let Some(v) = file_cfg.chain_id {
        settings.chain_id = v;
    }
    if let Some(v) = file_cfg.wallet_key_path {
        settings.wallet_key_path = v;
    }
    if let Some(v) = file_cfg.auto_connect_wallet {
        settings.auto_connect_wallet = v;
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DATABASE_URL") {
        settings.ledger_url = v;
    }
    if let Some(v) = lookup("APP__LEDGER_URL") {
        settings.ledger_url = v;
    }

    if let Some(v) = lookup("APP__CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }

    if let Some(v) = lookup("APP__CHAIN_ID") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.chain_id = parsed,
            Err(_) => warn!("ignoring APP__CHAIN_ID={v}: not an integer"),
        }
    }

    if let Some(v) = lookup("APP__WALLET_KEY_PATH") {
        settings.wallet_key_path = PathBuf::from(v);
    }

    if let Some(v) = lookup("APP__AUTO_CONNECT_WALLET") {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => settings.auto_connect_wallet = true,
            "0" | "false" | "no" => settings.auto_connect_wallet = false,
            _ => warn!("ignoring APP__AUTO_CONNECT_WALLET={v}: not a boolean"),
        }
    }
}

pub fn normalize_ledger_url(raw_ledger_url: &str) -> String {
    let raw_ledger_url = raw_ledger_url.trim();

    if raw_ledger_url.is_empty() {
        return Settings::default().ledger_url;
    }

    if raw_ledger_url.starts_with("sqlite::memory:") || raw_ledger_url.contains("://") {
        return raw_ledger_url.to_string();
    }

    if let Some(path) = raw_ledger_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_ledger_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_ledger_url("./data/test.db"),
            "sqlite://./data/test.db"
        );
        assert_eq!(
            normalize_ledger_url("sqlite:./data/test.db"),
            "sqlite://./data/test.db"
        );
        assert_eq!(normalize_ledger_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_ledger_url("  "), Settings::default().ledger_url);
    }

    #[test]
    fn env_overrides_win_over_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "sqlite://db-from-database-url.db"),
            ("APP__LEDGER_URL", "sqlite://db-from-app.db"),
            ("APP__CHAIN_ID", "11155111"),
            ("APP__AUTO_CONNECT_WALLET", "no"),
        ]);
        let mut settings = Settings::default();
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.ledger_url, "sqlite://db-from-app.db");
        assert_eq!(settings.chain_id, 11155111);
        assert!(!settings.auto_connect_wallet);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = Settings::default();
        apply_env(&mut settings, |key| match key {
            "APP__CHAIN_ID" => Some("mainnet".to_string()),
            "APP__AUTO_CONNECT_WALLET" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_settings_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bioauth.toml");
        fs::write(
            &path,
            "contract_address = \"0xfeed\"\nchain_id = 1\nwallet_key_path = \"keys/w.key\"\n",
        )
        .expect("write config");

        let mut settings = Settings::default();
        let raw = fs::read_to_string(&path).expect("read");
        apply_file(&mut settings, toml::from_str(&raw).expect("parse"));

        assert_eq!(settings.contract_address, "0xfeed");
        assert_eq!(settings.chain_id, 1);
        assert_eq!(settings.wallet_key_path, PathBuf::from("keys/w.key"));
        assert_eq!(settings.ledger_url, Settings::default().ledger_url);
    }

    #[test]
    fn explicit_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.toml");
        assert!(load_settings(Some(&missing)).is_err());
    }
}
