use tauri::AppHandle;

use crate::models::Settings;
#[cfg(all(target_os = "windows", not(debug_assertions)))]
use tauri_plugin_autostart::ManagerExt;

#[tauri::command]
pub async fn get_settings(app_handle: AppHandle) -> Result<Settings, String> {
    Ok(crate::utils::paths::read_settings(&app_handle))
}

#[tauri::command]
pub async fn update_settings(app_handle: AppHandle, settings: Settings) -> Result<(), String> {
    let config_path = crate::utils::paths::settings_path(&app_handle).map_err(|e| e.to_string())?;
    if let Some(config_dir) = config_path.parent() {
        std::fs::create_dir_all(config_dir).map_err(|e| e.to_string())?;
    }

    let content = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
    std::fs::write(&config_path, content).map_err(|e| e.to_string())?;

    #[cfg(all(target_os = "windows", not(debug_assertions)))]
    {
        let autostart = app_handle.autolaunch();
        if settings.general.enable_startup {
            let _ = autostart.enable();
        } else {
            let _ = autostart.disable();
        }
    }

    Ok(())
}
