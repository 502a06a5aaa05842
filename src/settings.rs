//! Persisted settings for the agent CLI.
//! Stored in the platform-specific config directory via `directories::ProjectDirs`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::agent::{AgentConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_QUEUE_CAPACITY};

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// ADB device ID (optional)
    pub device_id: String,
    /// Delay between hierarchy polls in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum cycles before the CLI gives up
    pub max_cycles: u64,
    /// Experiences buffered before an optimization pass
    pub buffer_capacity: usize,
    /// Pending events kept while a cycle is in flight
    pub queue_capacity: usize,
    /// Archive experience batches before they are cleared
    pub archive_experiences: bool,
    /// Archive path; empty means the default data directory
    pub archive_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            poll_interval_ms: 1000,
            max_cycles: 50,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            archive_experiences: false,
            archive_path: String::new(),
        }
    }
}

impl AppSettings {
    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "moderras", "ui-agent")
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path.
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        let mut loaded: Self = Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        // Zero capacities would disable the buffer or queue entirely.
        let defaults = Self::default();
        if loaded.buffer_capacity == 0 {
            loaded.buffer_capacity = defaults.buffer_capacity;
        }
        if loaded.queue_capacity == 0 {
            loaded.queue_capacity = defaults.queue_capacity;
        }

        loaded
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir().ok_or("Cannot determine config directory")?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(dir.join("settings.json"), content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Agent loop configuration derived from these settings.
    pub fn agent_config(&self) -> AgentConfig {
        let config = AgentConfig::default()
            .with_buffer_capacity(self.buffer_capacity)
            .with_queue_capacity(self.queue_capacity);
        if self.device_id.is_empty() {
            config
        } else {
            config.with_device_id(&self.device_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"device_id": "emulator-5554"}"#).unwrap();
        assert_eq!(settings.device_id, "emulator-5554");
        assert_eq!(settings.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert!(!settings.archive_experiences);
    }

    #[test]
    fn test_agent_config() {
        let mut settings = AppSettings::default();
        assert!(settings.agent_config().device_id.is_none());

        settings.device_id = "emulator-5554".to_string();
        settings.buffer_capacity = 10;
        let config = settings.agent_config();
        assert_eq!(config.device_id.as_deref(), Some("emulator-5554"));
        assert_eq!(config.buffer_capacity, 10);
    }
}
