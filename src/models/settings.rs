use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    pub general: GeneralSettings,
    pub notifications: NotificationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            general: GeneralSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "default_enable_startup")]
    pub enable_startup: bool,
    pub startup_behavior: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            enable_startup: true,
            startup_behavior: "minimized_to_tray".to_string(),
        }
    }
}

fn default_enable_startup() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch. Scheduling still runs when off so nothing is lost;
    /// delivery is suppressed at show time.
    pub enabled: bool,
    pub play_sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            play_sound: true,
        }
    }
}
