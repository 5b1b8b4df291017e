use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::scanner::SamplerConfig;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerSettings {
    /// Base URL of the classification service.
    pub endpoint: String,
    pub auth_token: Option<String>,
    pub sample_interval_ms: u64,
    pub classify_timeout_ms: u64,
    pub reward_pulse_ms: u64,
    /// Off by default: every qualifying result is counted.
    pub reward_cooldown_ms: Option<u64>,
    pub jpeg_quality: u8,
    /// Still image replayed as the camera; a synthetic pattern when unset.
    pub frame_path: Option<PathBuf>,
    pub warmup_frames: u32,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        let sampler = SamplerConfig::default();
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            auth_token: None,
            sample_interval_ms: sampler.sample_interval.as_millis() as u64,
            classify_timeout_ms: sampler.classify_timeout.as_millis() as u64,
            reward_pulse_ms: sampler.reward_pulse.as_millis() as u64,
            reward_cooldown_ms: None,
            jpeg_quality: sampler.jpeg_quality,
            frame_path: None,
            warmup_frames: 0,
        }
    }
}

impl ScannerSettings {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            sample_interval: Duration::from_millis(self.sample_interval_ms.max(1)),
            classify_timeout: Duration::from_millis(self.classify_timeout_ms.max(1)),
            reward_pulse: Duration::from_millis(self.reward_pulse_ms),
            reward_cooldown: self.reward_cooldown_ms.map(Duration::from_millis),
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms.max(1))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("EMOSCAN_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(token) = lookup("EMOSCAN_TOKEN").filter(|v| !v.is_empty()) {
            self.auth_token = Some(token);
        }
        if let Some(path) = lookup("EMOSCAN_FRAME").filter(|v| !v.is_empty()) {
            self.frame_path = Some(PathBuf::from(path));
        }
        if let Some(interval) = lookup("EMOSCAN_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.sample_interval_ms = interval;
        }
    }
}

pub fn debug_mode() -> bool {
    std::env::var("EMOSCAN_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            ScannerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scanner(&self) -> ScannerSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_scanner(&self, settings: ScannerSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &ScannerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn temp_settings_path() -> PathBuf {
        std::env::temp_dir().join(format!("emoscan-settings-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn defaults_match_sampler_defaults() {
        let settings = ScannerSettings::default();
        let config = settings.sampler_config();

        assert_eq!(config.sample_interval, Duration::from_millis(1500));
        assert_eq!(config.classify_timeout, Duration::from_secs(10));
        assert_eq!(config.reward_pulse, Duration::from_millis(3000));
        assert_eq!(config.reward_cooldown, None);
        assert_eq!(config.jpeg_quality, 70);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = SettingsStore::new(temp_settings_path()).unwrap();
        assert_eq!(store.scanner(), ScannerSettings::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let path = temp_settings_path();
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.scanner();
        settings.endpoint = "https://scan.example.org".into();
        settings.reward_cooldown_ms = Some(4500);
        store.update_scanner(settings.clone()).unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reloaded.scanner(), settings);
        assert_eq!(
            reloaded.scanner().sampler_config().reward_cooldown,
            Some(Duration::from_millis(4500))
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_settings_path();
        fs::write(&path, r#"{ "sample_interval_ms": 2000 }"#).unwrap();

        let settings = SettingsStore::new(path.clone()).unwrap().scanner();
        assert_eq!(settings.sample_interval_ms, 2000);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = temp_settings_path();
        fs::write(&path, "not json").unwrap();

        let settings = SettingsStore::new(path.clone()).unwrap().scanner();
        assert_eq!(settings, ScannerSettings::default());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EMOSCAN_ENDPOINT", "http://10.0.0.2:8080"),
            ("EMOSCAN_FRAME", "/tmp/face.jpg"),
            ("EMOSCAN_INTERVAL_MS", "not-a-number"),
            ("EMOSCAN_TOKEN", ""),
        ]);

        let mut settings = ScannerSettings::default();
        settings.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.endpoint, "http://10.0.0.2:8080");
        assert_eq!(settings.frame_path, Some(PathBuf::from("/tmp/face.jpg")));
        assert_eq!(settings.sample_interval_ms, 1500);
        assert_eq!(settings.auth_token, None);
    }
}
