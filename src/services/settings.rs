use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::database::Database;

pub const SETTINGS_KEY: &str = "finchat:settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub typing_enabled: bool,
    pub typing_interval_ms: u64,
    pub table_page_size: usize,
    pub group_tables_by_date: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            typing_enabled: true,
            typing_interval_ms: 15,
            table_page_size: 10,
            group_tables_by_date: true,
        }
    }
}

impl AppSettings {
    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms.max(1))
    }

    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("typing_enabled", self.typing_enabled.to_string()),
            ("typing_interval_ms", self.typing_interval_ms.to_string()),
            ("table_page_size", self.table_page_size.to_string()),
            ("group_tables_by_date", self.group_tables_by_date.to_string()),
        ]
    }

    /// Set one field from its textual form, as typed on the command line.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "typing_enabled" => self.typing_enabled = parse_bool(value)?,
            "typing_interval_ms" => self.typing_interval_ms = value.parse()?,
            "table_page_size" => {
                let size: usize = value.parse()?;
                if size == 0 {
                    bail!("table_page_size must be at least 1");
                }
                self.table_page_size = size;
            }
            "group_tables_by_date" => self.group_tables_by_date = parse_bool(value)?,
            other => bail!("Unknown setting: {}", other),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => bail!("Expected a boolean, got {:?}", value),
    }
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(db: &Database) -> AppSettings {
        match db.get(SETTINGS_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::error!("Failed to load settings: {}", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(db: &Database, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.set(SETTINGS_KEY, &json).await
    }
}
