use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "sportscast_tui";
const DEFAULT_CATALOG_URL: &str = "https://raw.githubusercontent.com/sportscast-tui/streams/main/streams.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,
    #[serde(default = "default_volume")]
    pub initial_volume: f32,
    #[serde(default = "default_commentary_interval")]
    pub commentary_interval_secs: u64,
    #[serde(default = "default_highlight_interval")]
    pub highlight_interval_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_catalog_url() -> String { DEFAULT_CATALOG_URL.to_string() }
fn default_ffmpeg() -> String { "ffmpeg".to_string() }
fn default_volume() -> f32 { 0.5 }
fn default_commentary_interval() -> u64 { 8 }
fn default_highlight_interval() -> u64 { 25 }
fn default_log_level() -> String { "info".to_string() }
fn default_timeout() -> u64 { 30 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            ffmpeg_path: default_ffmpeg(),
            initial_volume: default_volume(),
            commentary_interval_secs: default_commentary_interval(),
            highlight_interval_secs: default_highlight_interval(),
            log_level: default_log_level(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl AppConfig {
    pub fn app_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        fs::create_dir_all(&path).ok();
        path
    }

    fn config_path() -> PathBuf {
        Self::app_dir().join("config.json")
    }

    pub fn log_path() -> PathBuf {
        Self::app_dir().join("sportscast.log")
    }

    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = Self::from_json(&content) {
                    return config;
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        let path = Self::config_path();
        if let Ok(content) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, content);
        }
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    // Zero would make tokio::time::interval panic.
    pub fn commentary_interval(&self) -> Duration {
        Duration::from_secs(self.commentary_interval_secs.max(1))
    }

    pub fn highlight_interval(&self) -> Duration {
        Duration::from_secs(self.highlight_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config =
            AppConfig::from_json(r#"{"catalog_url": "http://localhost/s.json", "initial_volume": 0.8}"#)
                .unwrap();
        assert_eq!(config.catalog_url, "http://localhost/s.json");
        assert_eq!(config.initial_volume, 0.8);
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.commentary_interval_secs, 8);
    }

    #[test]
    fn zero_intervals_are_raised() {
        let config = AppConfig {
            commentary_interval_secs: 0,
            highlight_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.commentary_interval(), Duration::from_secs(1));
        assert_eq!(config.highlight_interval(), Duration::from_secs(1));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AppConfig::from_json("{not json").is_err());
    }
}
