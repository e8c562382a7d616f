// Prevents additional console window on Windows (silent launch).
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

mod commands;
mod database;
mod models;
mod services;
mod utils;

use std::sync::Arc;
use tauri::Manager;

use services::notifier::SystemNotifier;

fn main() {
    env_logger::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_autostart::init(
            tauri_plugin_autostart::MacosLauncher::LaunchAgent,
            Some(vec!["--autostart"]),
        ))
        .plugin(tauri_plugin_notification::init())
        .setup(|app| {
            let app_handle = app.handle();
            let data_dir = app_handle.path().app_data_dir().expect("Failed to get app data dir");

            // Create data directory if it doesn't exist
            std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");

            // Initialize database
            let db_path = data_dir.join("remindflow.db");
            database::init_database(&db_path).expect("Failed to initialize database");

            // Notification delivery service. Also the injection point for
            // everything that needs the notifier: commands pull it from
            // managed state, the refresh loop gets its own Arc.
            let notifier = Arc::new(SystemNotifier::new(app_handle.clone()));
            notifier.start();
            app.manage(Arc::clone(&notifier));

            // First pass re-arms every rule immediately (armed notifications
            // do not survive a restart), then keeps the daily horizon rolling.
            services::refresh::start_refresh(app_handle.clone(), notifier);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Reminder commands
            commands::reminders::get_reminders,
            commands::reminders::save_reminder,
            commands::reminders::delete_reminder,
            // Agenda commands
            commands::agenda::get_agenda,
            commands::agenda::toggle_acknowledgment,
            // Settings commands
            commands::settings::get_settings,
            commands::settings::update_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
