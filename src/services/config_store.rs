// Configuration Storage Service
// config.json read/write with rolling backups

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ParaphraseStyle;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub paraphrase: ParaphraseConfig,
    #[serde(default)]
    pub plagiarism: PlagiarismConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL to route upstream calls through, if enabled.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https
            .as_deref()
            .or(self.http.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Ask for high/medium sentence tiers instead of the single legacy list.
    #[serde(default = "default_true")]
    pub tiered: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            tiered: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParaphraseConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub default_style: ParaphraseStyle,
}

impl Default for ParaphraseConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            default_style: ParaphraseStyle::Default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismConfig {
    /// Remote checker URL. Without one (or without a key) results are simulated.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

impl Default for PlagiarismConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            simulate: false,
            max_sources: default_max_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_model() -> String { crate::services::providers::GEMINI_DEFAULT_MODEL.to_string() }
fn default_true() -> bool { true }
fn default_max_sources() -> usize { 5 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_delay_ms() -> u64 { 1000 }
fn default_request_timeout_secs() -> u64 { 80 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("authcheck"))
    }


    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Load, apply `change`, and save with a backup of the previous file.
    pub fn update<F>(&self, change: F) -> Result<AppConfig, String>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.load()?;
        change(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        Ok(self.load()?.api_keys.get(provider).cloned())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        self.update(|c| {
            c.api_keys.insert(provider.to_string(), key.to_string());
        })
        .map(|_| ())
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        self.update(|c| {
            c.api_keys.remove(provider);
        })
        .map(|_| ())
    }

    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        self.update(|c| {
            let entry = c.providers.entry(provider.to_string()).or_default();
            entry.enabled = true;
            entry.base_url = Some(url.to_string());
        })
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (ConfigStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("authcheck-test-{}", uuid::Uuid::new_v4()));
        (ConfigStore::new(dir.clone()), dir)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.detection.tiered);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.plagiarism.max_sources, 5);
        assert_eq!(config.paraphrase.default_style, ParaphraseStyle::Default);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"version": "1.0.0", "retry": {"maxRetries": 5}, "paraphrase": {"defaultStyle": "unknown"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.paraphrase.default_style, ParaphraseStyle::Default);
        assert!(config.detection.tiered);
    }

    #[test]
    fn test_proxy_active_url() {
        let mut proxy = ProxyConfig {
            enabled: false,
            http: Some("http://proxy:8080".to_string()),
            https: None,
        };
        assert_eq!(proxy.active_url(), None);
        proxy.enabled = true;
        assert_eq!(proxy.active_url(), Some("http://proxy:8080"));
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let (store, _dir) = temp_store();
        let config = store.load().unwrap();
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn test_api_key_round_trip_with_backup() {
        let (store, dir) = temp_store();
        store.set_api_key("gemini", "k-1").unwrap();
        store.set_api_key("plagiarism", "k-2").unwrap();
        assert_eq!(store.get_api_key("gemini").unwrap().as_deref(), Some("k-1"));

        store.delete_api_key("gemini").unwrap();
        assert_eq!(store.get_api_key("gemini").unwrap(), None);
        assert_eq!(store.get_api_key("plagiarism").unwrap().as_deref(), Some("k-2"));

        let backups = fs::read_dir(dir.join("backups")).unwrap().count();
        assert!(backups >= 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_provider_url() {
        let (store, dir) = temp_store();
        store.set_provider_url("gemini", "http://localhost:9000").unwrap();
        let config = store.load().unwrap();
        let gemini = &config.providers["gemini"];
        assert!(gemini.enabled);
        assert_eq!(gemini.base_url.as_deref(), Some("http://localhost:9000"));
        let _ = fs::remove_dir_all(&dir);
    }
}
