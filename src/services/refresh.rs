use std::sync::Arc;
use std::time::Duration;
use tauri::AppHandle;

use crate::database::queries;
use crate::services::notifier::SystemNotifier;
use crate::services::scheduler;

// Re-arm cadence. Short enough that the 24h daily horizon never runs dry.
const REFRESH_INTERVAL_SECS: u64 = 30 * 60;

/// Periodically re-arms every rule. The first pass runs immediately: the
/// notifier's armed table is in-memory, so after a restart nothing is
/// pending until this pass rebuilds it from the stored rules. Cancel and
/// reschedule are both safe to re-run, so the same pass also recovers any
/// cancellation a crash interrupted.
pub fn start_refresh(app_handle: AppHandle, notifier: Arc<SystemNotifier>) {
    tauri::async_runtime::spawn(async move {
        println!("[Refresh] ✅ Service started (runs every 30m)");

        loop {
            if let Err(e) = run_refresh(&app_handle, notifier.as_ref()) {
                log::error!("Refresh pass failed: {}", e);
            }

            tokio::time::sleep(Duration::from_secs(REFRESH_INTERVAL_SECS)).await;
        }
    });
}

fn run_refresh(app_handle: &AppHandle, notifier: &SystemNotifier) -> anyhow::Result<()> {
    let db_path = crate::utils::paths::db_path(app_handle)?;
    let conn = crate::database::open(&db_path)?;

    let rules = queries::get_reminder_rules(&conn)?;
    let now = chrono::Local::now().naive_local();

    let _guard = scheduler::lock_scheduling();
    for rule in &rules {
        if let Err(e) = scheduler::reschedule(&conn, notifier, rule, now) {
            log::error!("Failed to re-arm '{}': {}", rule.title, e);
        }
    }

    println!("[Refresh] 🔁 Re-armed {} reminder rule(s)", rules.len());
    Ok(())
}
