use std::sync::Arc;
use tauri::{AppHandle, State};

use crate::database::queries;
use crate::models::AgendaView;
use crate::services::notifier::SystemNotifier;
use crate::services::{agenda, reconciler, scheduler};

#[tauri::command]
pub async fn get_agenda(app_handle: AppHandle) -> Result<AgendaView, String> {
    let db_path = crate::utils::paths::db_path(&app_handle).map_err(|e| e.to_string())?;
    let conn = crate::database::open(&db_path).map_err(|e| e.to_string())?;

    let rules = queries::get_reminder_rules(&conn).map_err(|e| e.to_string())?;
    let now = chrono::Local::now().naive_local();

    agenda::agenda_view(&conn, &rules, now).map_err(|e| e.to_string())
}

/// Flips one occurrence between handled and pending. Acknowledging cancels
/// the pending follow-up burst; un-acknowledging re-arms whatever part of
/// it still lies ahead. Returns the new state.
#[tauri::command]
pub async fn toggle_acknowledgment(
    app_handle: AppHandle,
    notifier: State<'_, Arc<SystemNotifier>>,
    rule_id: String,
    occurrence_key: String,
) -> Result<bool, String> {
    let db_path = crate::utils::paths::db_path(&app_handle).map_err(|e| e.to_string())?;
    let conn = crate::database::open(&db_path).map_err(|e| e.to_string())?;

    let now = chrono::Local::now().naive_local();

    let _guard = scheduler::lock_scheduling();
    reconciler::toggle_acknowledgment(
        &conn,
        notifier.inner().as_ref(),
        &rule_id,
        &occurrence_key,
        now,
    )
    .map_err(|e| e.to_string())
}
