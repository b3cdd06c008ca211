//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use detox_core::PipelineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub bind_addr: String,
    /// Root holding one directory per model. `None` = platform default.
    pub models_dir: Option<PathBuf>,
    pub classifier_model: String,
    pub transcriber_model: String,
    pub toxicity_threshold: f32,
    pub max_tokens: usize,
    pub narration_backend: String,
    pub narration_lang: String,
    pub narration_tld: String,
    pub narration_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub narration_ttl_secs: u64,
    pub ort_ep: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7860".into(),
            models_dir: None,
            classifier_model: "nontoxicme".into(),
            transcriber_model: "whisper-tiny".into(),
            toxicity_threshold: 0.5,
            max_tokens: 512,
            narration_backend: "google".into(),
            narration_lang: "en".into(),
            narration_tld: "com".into(),
            narration_timeout_secs: 10,
            request_timeout_secs: 120,
            narration_ttl_secs: 300,
            ort_ep: "auto".into(),
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = AppSettings::default();
        self.bind_addr = non_empty_or(&self.bind_addr, &defaults.bind_addr);
        self.models_dir = self
            .models_dir
            .take()
            .filter(|p| !p.as_os_str().is_empty());
        self.classifier_model = non_empty_or(&self.classifier_model, &defaults.classifier_model);
        self.transcriber_model = non_empty_or(&self.transcriber_model, &defaults.transcriber_model);
        if !self.toxicity_threshold.is_finite()
            || self.toxicity_threshold <= 0.0
            || self.toxicity_threshold >= 1.0
        {
            self.toxicity_threshold = defaults.toxicity_threshold;
        }
        self.max_tokens = self.max_tokens.clamp(8, 4096);
        self.narration_backend = normalize_narration_backend(&self.narration_backend);
        self.narration_lang = non_empty_or(&self.narration_lang.to_ascii_lowercase(), "en");
        self.narration_tld = non_empty_or(self.narration_tld.trim_start_matches('.'), "com");
        self.narration_timeout_secs = self.narration_timeout_secs.clamp(1, 120);
        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 600);
        self.narration_ttl_secs = self.narration_ttl_secs.clamp(10, 86_400);
        self.ort_ep = normalize_ort_ep(&self.ort_ep);
    }

    /// Pipeline knobs. Backends read `max_tokens` from here too.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            toxicity_threshold: self.toxicity_threshold,
            max_tokens: self.max_tokens,
        }
    }
}

fn non_empty_or(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.into()
    } else {
        trimmed.into()
    }
}

pub fn normalize_narration_backend(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "silent" | "off" | "none" | "offline" => "silent".into(),
        _ => "google".into(),
    }
}

pub fn normalize_ort_ep(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cpu" => "cpu".into(),
        "dml" | "directml" => "directml".into(),
        _ => "auto".into(),
    }
}

/// Export settings that the core reads from the environment, unless the
/// operator already set them.
pub fn apply_runtime_env_from_settings(settings: &AppSettings) {
    if std::env::var("DETOX_ORT_EP").is_err() {
        std::env::set_var("DETOX_ORT_EP", &settings.ort_ep);
    }
    if std::env::var("DETOX_MODEL_DIR").is_err() {
        if let Some(dir) = settings.models_dir.as_ref() {
            std::env::set_var("DETOX_MODEL_DIR", dir);
        }
    }
}

/// `DETOX_SETTINGS` if set, otherwise `settings.json` in the data directory.
pub fn settings_path() -> PathBuf {
    match std::env::var_os("DETOX_SETTINGS") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => default_settings_path(),
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Detox")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("detox")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&dir.path().join("absent.json"));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(load_settings(&path), AppSettings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults_and_normalizes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"toxicityThreshold": 1.5, "maxTokens": 100000, "narrationBackend": "OFF", "ortEp": "DML"}"#,
        )
        .expect("write");

        let settings = load_settings(&path);
        assert_eq!(settings.toxicity_threshold, 0.5);
        assert_eq!(settings.max_tokens, 4096);
        assert_eq!(settings.narration_backend, "silent");
        assert_eq!(settings.ort_ep, "directml");
        assert_eq!(settings.bind_addr, "127.0.0.1:7860");
    }

    #[test]
    fn pipeline_config_carries_normalized_budget() {
        let mut settings = AppSettings {
            toxicity_threshold: 0.8,
            max_tokens: 3,
            ..AppSettings::default()
        };
        settings.normalize();

        let config = settings.pipeline_config();
        assert_eq!(config.toxicity_threshold, 0.8);
        assert_eq!(config.max_tokens, 8);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            toxicity_threshold: 0.7,
            narration_lang: "fr".into(),
            ..AppSettings::default()
        };
        save_settings(&path, &settings).expect("save");
        assert_eq!(load_settings(&path), settings);
    }
}
