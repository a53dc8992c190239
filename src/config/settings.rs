//! Application settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration, stored as TOML in the platform config dir.
/// Command-line flags override these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default baud rate for the instrument link
    pub baud: u32,
    /// Default baud rate for the ground-station receiver
    pub ground_baud: u32,
    /// Base directory for session output (default: `~/via_outputlogs`)
    pub output_dir: Option<PathBuf>,
    /// Progress bar width in characters
    pub progress_width: usize,
    /// Transfer protocol: seconds to wait for a response marker
    pub response_timeout_secs: u64,
    /// Transfer protocol: seconds to wait between payload lines
    pub data_timeout_secs: u64,
    /// Command sent by one-shot capture
    pub measure_command: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            baud: 115_200,
            ground_baud: 9_600,
            output_dir: None,
            progress_width: 30,
            response_timeout_secs: 5,
            data_timeout_secs: 10,
            measure_command: "VIA_MEASURE".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from the platform config dir, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = super::config_dir().map(|d| d.join("config.toml")) else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save config to the platform config dir.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = super::config_dir().ok_or("could not determine config directory")?;
        std::fs::create_dir_all(&dir)?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(dir.join("config.toml"), content)?;
        Ok(())
    }

    /// Resolved output base directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(super::default_output_dir)
            .unwrap_or_else(|| PathBuf::from("via_outputlogs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.ground_baud, 9_600);
        assert_eq!(config.measure_command, "VIA_MEASURE");
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.baud, config.baud);
        assert_eq!(back.progress_width, config.progress_width);
    }
}
