use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::domain::uuids;

/// Services requested by default so their characteristics come back on
/// most devices.
pub const DEFAULT_SERVICES: &[&str] = &[
    "generic_access",
    "generic_attribute",
    "device_information",
    "battery_service",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "gattscope".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Extra service names or UUIDs to request, comma or newline separated.
    #[serde(default)]
    pub custom_services_input: String,

    /// When set, scanning only reports devices advertising one of the
    /// allowed services; otherwise every nearby device is listed.
    #[serde(default = "default_false")]
    pub filter_scan_to_services: bool,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Settings {
    /// Default service names plus the user's additions, deduplicated, in
    /// input order.
    pub fn allowed_services(&self) -> Vec<String> {
        let mut services: Vec<String> =
            DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect();

        for entry in self.custom_services_input.split([',', '\n']) {
            let entry = entry.trim().to_ascii_lowercase();
            if !entry.is_empty() && !services.contains(&entry) {
                services.push(entry);
            }
        }

        services
    }

    /// Allowed services expanded to full 128-bit UUID strings. Entries
    /// that do not resolve are dropped with a diagnostic.
    pub fn service_filters(&self) -> Vec<String> {
        self.allowed_services()
            .iter()
            .filter_map(|name| {
                let full = uuids::expand_to_full(name);
                if full.is_none() {
                    tracing::debug!(service = %name, "ignoring unresolvable service filter");
                }
                full
            })
            .collect()
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("GattScope");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// In-memory service that never touches the real config directory.
    #[cfg(test)]
    pub fn for_tests(settings: Settings) -> Self {
        Self {
            settings,
            settings_path: std::env::temp_dir().join("gattscope-test-settings.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_services_merges_and_dedupes() {
        let settings = Settings {
            custom_services_input: "heart_rate, battery_service\n180d,  ".to_string(),
            ..Default::default()
        };
        let services = settings.allowed_services();
        assert_eq!(
            services,
            vec![
                "generic_access",
                "generic_attribute",
                "device_information",
                "battery_service",
                "heart_rate",
                "180d",
            ]
        );
    }

    #[test]
    fn test_service_filters_expand_and_drop_garbage() {
        let settings = Settings {
            custom_services_input: "180d, not a service".to_string(),
            ..Default::default()
        };
        let filters = settings.service_filters();
        assert!(filters.contains(&"0000180d-0000-1000-8000-00805f9b34fb".to_string()));
        assert!(filters.iter().all(|f| f.len() == 36));
        // The defaults plus the one resolvable custom entry.
        assert_eq!(filters.len(), DEFAULT_SERVICES.len() + 1);
    }
}
