use crate::i18n::Locale;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "lofi-radio";
const SETTINGS_FILE: &str = "settings.json";
const LIKES_FILE: &str = "likes.json";
const SESSION_FILE: &str = "session.json";
const CACHE_DIR: &str = "cache";
const LOGS_DIR: &str = "logs";

pub const DEFAULT_CACHE_VERSION: &str = "lofi-radio-v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_playlist")]
    pub playlist: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub locale: Option<Locale>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub autoplay: bool,
    #[serde(default = "default_offline_cache")]
    pub offline_cache: bool,
    #[serde(default = "default_cache_version")]
    pub cache_version: String,
    #[serde(default)]
    pub shell_assets: Vec<String>,
}

fn default_playlist() -> String {
    String::from("playlist.json")
}

fn default_volume() -> f32 {
    1.0
}

fn default_offline_cache() -> bool {
    true
}

fn default_cache_version() -> String {
    String::from(DEFAULT_CACHE_VERSION)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playlist: default_playlist(),
            category: None,
            locale: None,
            volume: default_volume(),
            autoplay: false,
            offline_cache: default_offline_cache(),
            cache_version: default_cache_version(),
            shell_assets: Vec::new(),
        }
    }
}

impl Settings {
    pub fn resolved_locale(&self) -> Locale {
        self.locale.unwrap_or_else(Locale::from_env)
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("LOFI_RADIO_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn likes_path() -> Result<PathBuf> {
    Ok(config_root()?.join(LIKES_FILE))
}

pub fn session_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SESSION_FILE))
}

pub fn cache_root() -> Result<PathBuf> {
    Ok(config_root()?.join(CACHE_DIR))
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(config_root()?.join(LOGS_DIR))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn written_settings_load_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);

        let settings = Settings {
            category: Some(String::from("xmas")),
            locale: Some(Locale::En),
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).expect("serialize");
        fs::write(&path, json).expect("write");
        let loaded = load_settings_from(&path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"playlist":"https://radio.example/playlist.json"}"#).expect("write");

        let loaded = load_settings_from(&path).expect("load");
        assert_eq!(loaded.playlist, "https://radio.example/playlist.json");
        assert_eq!(loaded.cache_version, DEFAULT_CACHE_VERSION);
        assert!(loaded.offline_cache);
        assert!(!loaded.autoplay);
        assert_eq!(loaded.volume, 1.0);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().expect("tempdir");
        let loaded = load_settings_from(&dir.path().join("absent.json")).expect("load");
        assert_eq!(loaded, Settings::default());
    }
}
