use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::database::queries;
use crate::models::ReminderRule;
use crate::services::notifier::Notifier;
use crate::services::occurrence::{parse_occurrence_key, FOLLOW_UP_HORIZON_MINS};
use crate::services::scheduler;

/// Marks one occurrence handled. Pending follow-ups are cancelled and their
/// record dropped BEFORE the acknowledgment is written: cancellation is safe
/// to re-run after a crash, an acknowledgment without cancellation is not.
/// Idempotent: re-acknowledging finds no handles and the record insert is
/// a set add.
pub fn acknowledge(
    conn: &Connection,
    notifier: &dyn Notifier,
    rule_id: &str,
    occurrence_key: &str,
) -> Result<()> {
    let handles = queries::get_follow_up_handles(conn, rule_id, occurrence_key)?;
    if !handles.is_empty() {
        scheduler::cancel_handles(notifier, &handles);
        queries::delete_follow_up_handles(conn, rule_id, occurrence_key)?;
    }

    queries::add_acknowledgment(conn, rule_id, occurrence_key)?;
    Ok(())
}

/// Reverses an acknowledgment. Follow-ups resume only while the occurrence
/// is still within the follow-up horizon; re-arming an older occurrence
/// silently produces nothing.
pub fn unacknowledge(
    conn: &Connection,
    notifier: &dyn Notifier,
    rule: &ReminderRule,
    occurrence_key: &str,
    now: NaiveDateTime,
) -> Result<()> {
    queries::remove_acknowledgment(conn, &rule.id, occurrence_key)?;

    if let Some(instant) = parse_occurrence_key(occurrence_key) {
        if (instant - now).num_minutes().abs() <= FOLLOW_UP_HORIZON_MINS {
            scheduler::arm_follow_ups(conn, notifier, rule, instant, now)?;
        }
    }

    Ok(())
}

/// Flips the acknowledgment state of one occurrence and returns the new
/// state.
pub fn toggle_acknowledgment(
    conn: &Connection,
    notifier: &dyn Notifier,
    rule_id: &str,
    occurrence_key: &str,
    now: NaiveDateTime,
) -> Result<bool> {
    if queries::is_acknowledged(conn, rule_id, occurrence_key)? {
        let rule = queries::get_reminder_rule(conn, rule_id)?
            .ok_or_else(|| anyhow!("unknown reminder {}", rule_id))?;
        unacknowledge(conn, notifier, &rule, occurrence_key, now)?;
        Ok(false)
    } else {
        acknowledge(conn, notifier, rule_id, occurrence_key)?;
        Ok(true)
    }
}

/// Full cascade for rule deletion. Every stored handle is cancelled before
/// its record is discarded so nothing leaks on the notification side, then
/// acknowledgments and the rule row itself go.
pub fn delete_rule(conn: &Connection, notifier: &dyn Notifier, rule_id: &str) -> Result<()> {
    let primary = queries::get_primary_handles(conn, rule_id)?;
    scheduler::cancel_handles(notifier, &primary);
    queries::delete_primary_handles(conn, rule_id)?;

    for (_, handles) in queries::get_follow_up_sets(conn, rule_id)? {
        scheduler::cancel_handles(notifier, &handles);
    }
    queries::delete_all_follow_up_handles(conn, rule_id)?;

    queries::delete_acknowledgments(conn, rule_id)?;
    queries::delete_reminder_rule(conn, rule_id)?;
    Ok(())
}
