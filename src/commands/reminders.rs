use std::sync::Arc;
use tauri::{AppHandle, State};
use uuid::Uuid;

use crate::database::queries;
use crate::models::{ReminderRule, SaveReminderRequest};
use crate::services::notifier::SystemNotifier;
use crate::services::{reconciler, scheduler};

#[tauri::command]
pub async fn get_reminders(app_handle: AppHandle) -> Result<Vec<ReminderRule>, String> {
    let db_path = crate::utils::paths::db_path(&app_handle).map_err(|e| e.to_string())?;
    let conn = crate::database::open(&db_path).map_err(|e| e.to_string())?;

    queries::get_reminder_rules(&conn).map_err(|e| e.to_string())
}

/// Create-or-update. Editing keeps the rule's id and creation date and
/// replaces every armed notification for it; acknowledgment records are
/// left untouched.
#[tauri::command]
pub async fn save_reminder(
    app_handle: AppHandle,
    notifier: State<'_, Arc<SystemNotifier>>,
    request: SaveReminderRequest,
) -> Result<ReminderRule, String> {
    let db_path = crate::utils::paths::db_path(&app_handle).map_err(|e| e.to_string())?;
    let conn = crate::database::open(&db_path).map_err(|e| e.to_string())?;

    let now_ts = chrono::Utc::now().timestamp();
    let rule = match request.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => {
            let existing = queries::get_reminder_rule(&conn, id)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("Unknown reminder {}", id))?;
            ReminderRule {
                id: existing.id,
                title: request.title,
                notes: request.notes,
                recurrence: request.recurrence,
                created_at: existing.created_at,
                updated_at: now_ts,
            }
        }
        None => ReminderRule {
            id: Uuid::new_v4().to_string(),
            title: request.title,
            notes: request.notes,
            recurrence: request.recurrence,
            created_at: now_ts,
            updated_at: now_ts,
        },
    };

    // Validation happens before anything is written.
    rule.validate().map_err(|e| e.to_string())?;

    queries::upsert_reminder_rule(&conn, &rule).map_err(|e| e.to_string())?;

    let now = chrono::Local::now().naive_local();
    let _guard = scheduler::lock_scheduling();
    scheduler::reschedule(&conn, notifier.inner().as_ref(), &rule, now)
        .map_err(|e| e.to_string())?;

    Ok(rule)
}

#[tauri::command]
pub async fn delete_reminder(
    app_handle: AppHandle,
    notifier: State<'_, Arc<SystemNotifier>>,
    rule_id: String,
) -> Result<(), String> {
    let db_path = crate::utils::paths::db_path(&app_handle).map_err(|e| e.to_string())?;
    let conn = crate::database::open(&db_path).map_err(|e| e.to_string())?;

    let _guard = scheduler::lock_scheduling();
    reconciler::delete_rule(&conn, notifier.inner().as_ref(), &rule_id)
        .map_err(|e| e.to_string())?;

    Ok(())
}
