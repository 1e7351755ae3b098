//! # HomeCtl Configuration Module
//!
//! This module provides configuration management for HomeCtl, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use hcconfig::get_config;
//!
//! let config = get_config();
//! let target = config.get_search_target()?;
//! let workers = config.get_resolver_workers()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("homectl.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load HomeCtl configuration"));
}

const ENV_CONFIG_DIR: &str = "HOMECTL_CONFIG";
const ENV_PREFIX: &str = "HOMECTL_CONFIG__";

// Default values for configuration
const DEFAULT_SEARCH_TARGET: &str = "ssdp:all";
const DEFAULT_MX: u64 = 1;
const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;
const DEFAULT_WINDOW_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RESOLVER_WORKERS: u64 = 4;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().unwrap_or_else(|_| {
                    tracing::warn!(
                        "Invalid value '{}' for {}, using default {}",
                        s,
                        $path.join("."),
                        $default
                    );
                    $default
                })),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for HomeCtl
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// A configuration built with [`Config::from_yaml_str`] lives in memory only:
/// setters update it but nothing is written to disk.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: Option<String>,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".homectl").exists() {
            return ".homectl".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".homectl");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".homectl".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!(
                "Configuration path {} is not a directory",
                path.display()
            ));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Loads the configuration from the specified directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `HOMECTL_CONFIG` environment variable
    /// 3. `.homectl` in the current directory
    /// 4. `.homectl` in the user's home directory
    ///
    /// The embedded defaults are merged with `config.yaml` from that directory
    /// (when present), environment overrides are applied and the merged
    /// result is written back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&config_dir))?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let yaml_data = if let Ok(data) = fs::read_to_string(&path) {
            info!(config_file=%path, "Loaded config file");
            data
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.to_string()
        };

        let mut config_value = Self::merged_with_defaults(&yaml_data)?;
        Self::apply_env_overrides(&mut config_value, env::vars());

        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from a YAML document merged over the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(Self::merged_with_defaults(yaml)?),
        })
    }

    fn merged_with_defaults(yaml: &str) -> Result<Value> {
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external_value = Self::lower_keys_value(serde_yaml::from_str(yaml)?);
        merge_yaml(&mut default_value, &external_value);
        Ok(default_value)
    }

    /// Directory the configuration was loaded from (empty for in-memory configs).
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.lock_data()?;
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    fn lock_data(&self) -> Result<std::sync::MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration mutex poisoned"))
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["discovery", "mx"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock_data()?;
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides<I>(config: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!("Ignoring override {}: {}", key, err);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_string_config!(
        get_search_target,
        set_search_target,
        &["discovery", "search_target"],
        DEFAULT_SEARCH_TARGET
    );
    impl_u64_config!(get_discovery_mx, set_discovery_mx, &["discovery", "mx"], DEFAULT_MX);
    impl_u64_config!(
        get_receive_timeout_ms,
        set_receive_timeout_ms,
        &["discovery", "receive_timeout_ms"],
        DEFAULT_RECEIVE_TIMEOUT_MS
    );
    impl_u64_config!(
        get_discovery_window_secs,
        set_discovery_window_secs,
        &["discovery", "window_secs"],
        DEFAULT_WINDOW_SECS
    );
    impl_u64_config!(
        get_http_timeout_secs,
        set_http_timeout_secs,
        &["http", "timeout_secs"],
        DEFAULT_HTTP_TIMEOUT_SECS
    );
    impl_u64_config!(
        get_resolver_workers,
        set_resolver_workers,
        &["resolver", "workers"],
        DEFAULT_RESOLVER_WORKERS
    );
    impl_string_config!(get_log_level, set_log_level, &["log", "level"], DEFAULT_LOG_LEVEL);

    /// Socket read timeout bounding each wait for an SSDP response
    pub fn get_receive_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_millis(self.get_receive_timeout_ms()?))
    }

    /// Overall discovery window, `None` when set to 0
    pub fn get_discovery_window(&self) -> Result<Option<Duration>> {
        let secs = self.get_discovery_window_secs()?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn get_http_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_http_timeout_secs()?))
    }
}

/// Returns the process-wide configuration, loading it on first access.
///
/// # Panics
///
/// Panics on first access if the configuration directory cannot be prepared.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, it merges keys from external into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // une valeur nulle (fichier vide, clé sans valeur) garde le défaut
        (_, Value::Null) => {}
        // pour les scalaires ou séquences, on remplace
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_used_for_empty_document() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.get_search_target().unwrap(), "ssdp:all");
        assert_eq!(config.get_discovery_mx().unwrap(), 1);
        assert_eq!(config.get_http_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(config.get_resolver_workers().unwrap(), 4);
        assert_eq!(config.get_log_level().unwrap(), "info");
    }

    #[test]
    fn external_values_override_defaults_and_keys_are_lowercased() {
        let config = Config::from_yaml_str(
            "Discovery:\n  MX: 3\n  search_target: \"urn:schemas-upnp-org:device:InternetGatewayDevice:1\"\n",
        )
        .unwrap();
        assert_eq!(config.get_discovery_mx().unwrap(), 3);
        assert_eq!(
            config.get_search_target().unwrap(),
            "urn:schemas-upnp-org:device:InternetGatewayDevice:1"
        );
        // untouched sibling keeps its default
        assert_eq!(config.get_receive_timeout_ms().unwrap(), 1000);
    }

    #[test]
    fn env_overrides_are_parsed_as_yaml() {
        let mut value = Config::merged_with_defaults("{}").unwrap();
        Config::apply_env_overrides(
            &mut value,
            vec![
                ("HOMECTL_CONFIG__RESOLVER__WORKERS".to_string(), "16".to_string()),
                ("HOMECTL_CONFIG__LOG__LEVEL".to_string(), "debug".to_string()),
                ("UNRELATED".to_string(), "1".to_string()),
            ],
        );
        let config = Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(value),
        };
        assert_eq!(config.get_resolver_workers().unwrap(), 16);
        assert_eq!(config.get_log_level().unwrap(), "debug");
    }

    #[test]
    fn empty_document_keeps_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_discovery_window().unwrap(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_window_disables_the_discovery_window() {
        let config = Config::from_yaml_str("discovery:\n  window_secs: 0\n").unwrap();
        assert_eq!(config.get_discovery_window().unwrap(), None);
        config.set_discovery_window_secs(2).unwrap();
        assert_eq!(
            config.get_discovery_window().unwrap(),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn load_config_writes_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        fs::write(dir.path().join("config.yaml"), "http:\n  timeout_secs: 7\n").unwrap();

        let config = Config::load_config(&dir_str).unwrap();
        assert_eq!(config.get_http_timeout_secs().unwrap(), 7);
        assert_eq!(config.config_dir(), dir_str);

        let written = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert!(written.contains("resolver"));
    }
}
