use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

use crate::database::queries;
use crate::models::{Recurrence, ReminderRule};
use crate::services::notifier::{
    NotificationKind, NotificationPayload, NotificationPriority, Notifier,
};
use crate::services::occurrence::{
    self, occurrence_key, DAILY_HORIZON_HOURS, FOLLOW_UP_CADENCE_MINS, FOLLOW_UP_HORIZON_MINS,
    RECURRENCE_HORIZON_DAYS,
};

// Scheduling passes are read-modify-write over the handle tables and can be
// triggered from two places (foreground commands and the refresh loop), so
// they are serialized process-wide. Entry points take the guard; the worker
// functions below never lock.
static SCHEDULE_LOCK: Mutex<()> = Mutex::new(());

pub fn lock_scheduling() -> MutexGuard<'static, ()> {
    SCHEDULE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Arms every occurrence of `rule` within its scheduling horizon and
/// persists the primary handle set. Occurrences close enough to `now` also
/// get a follow-up burst (see `arm_follow_ups`).
///
/// A rejected arm request is logged and skipped; the batch never aborts and
/// an all-fail batch still succeeds with an empty handle list. Only
/// persistence errors propagate.
pub fn schedule(
    conn: &Connection,
    notifier: &dyn Notifier,
    rule: &ReminderRule,
    now: NaiveDateTime,
) -> Result<Vec<String>> {
    // Daily rules ride a short rolling window that the refresh service keeps
    // pushing forward; day-interval and one-shot rules are armed out to the
    // full horizon in one go.
    let window_end = match &rule.recurrence {
        Recurrence::Daily { .. } => now + Duration::hours(DAILY_HORIZON_HOURS),
        Recurrence::EveryNDays { .. } | Recurrence::Custom { .. } => {
            now + Duration::days(RECURRENCE_HORIZON_DAYS)
        }
    };
    let occurrences = occurrence::occurrences_in_window(rule, now, window_end);

    let mut primary = Vec::new();
    for instant in &occurrences {
        let payload = primary_payload(rule, *instant);
        match notifier.arm(*instant, &payload) {
            Ok(handle) => primary.push(handle),
            Err(e) => log::warn!(
                "Skipping occurrence {} of '{}': {}",
                occurrence_key(*instant),
                rule.title,
                e
            ),
        }
    }
    queries::set_primary_handles(conn, &rule.id, &primary)?;

    for instant in &occurrences {
        if (*instant - now).num_minutes() <= FOLLOW_UP_HORIZON_MINS {
            arm_follow_ups(conn, notifier, rule, *instant, now)?;
        }
    }

    Ok(primary)
}

/// The follow-up instants for an occurrence at `instant`: every 5 minutes
/// after it until the 6-hour follow-up horizon elapses, restricted to the
/// future. Re-arming a half-elapsed occurrence therefore yields only the
/// remaining tail, and an occurrence older than the horizon yields nothing.
pub fn follow_up_instants(instant: NaiveDateTime, now: NaiveDateTime) -> Vec<NaiveDateTime> {
    let steps = FOLLOW_UP_HORIZON_MINS / FOLLOW_UP_CADENCE_MINS;
    (1..=steps)
        .map(|k| instant + Duration::minutes(k * FOLLOW_UP_CADENCE_MINS))
        .filter(|t| *t > now)
        .collect()
}

/// Arms the follow-up burst for one occurrence and persists the handle set
/// under (rule, occurrence). Nothing is written when no instants remain.
pub fn arm_follow_ups(
    conn: &Connection,
    notifier: &dyn Notifier,
    rule: &ReminderRule,
    instant: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Vec<String>> {
    let key = occurrence_key(instant);

    let mut handles = Vec::new();
    for follow_up in follow_up_instants(instant, now) {
        let payload = follow_up_payload(rule, instant);
        match notifier.arm(follow_up, &payload) {
            Ok(handle) => handles.push(handle),
            Err(e) => log::warn!(
                "Skipping follow-up at {} for '{}': {}",
                occurrence_key(follow_up),
                rule.title,
                e
            ),
        }
    }

    if !handles.is_empty() {
        queries::set_follow_up_handles(conn, &rule.id, &key, &handles)?;
    }

    Ok(handles)
}

/// Best-effort cancellation. Stale or unknown handles are expected (the
/// notification may already have fired) and only warrant a warning.
pub fn cancel_handles(notifier: &dyn Notifier, handles: &[String]) {
    for handle in handles {
        if let Err(e) = notifier.cancel(handle) {
            log::warn!("Failed to cancel handle {}: {}", handle, e);
        }
    }
}

/// The only edit path: cancel everything previously armed for the rule,
/// drop the stored handle sets, then schedule fresh. No occurrence diffing.
pub fn reschedule(
    conn: &Connection,
    notifier: &dyn Notifier,
    rule: &ReminderRule,
    now: NaiveDateTime,
) -> Result<Vec<String>> {
    let old_primary = queries::get_primary_handles(conn, &rule.id)?;
    cancel_handles(notifier, &old_primary);
    queries::delete_primary_handles(conn, &rule.id)?;

    for (_, handles) in queries::get_follow_up_sets(conn, &rule.id)? {
        cancel_handles(notifier, &handles);
    }
    queries::delete_all_follow_up_handles(conn, &rule.id)?;

    schedule(conn, notifier, rule, now)
}

fn primary_payload(rule: &ReminderRule, instant: NaiveDateTime) -> NotificationPayload {
    NotificationPayload {
        title: rule.title.clone(),
        body: rule
            .notes
            .clone()
            .unwrap_or_else(|| format!("Due at {}", instant.format("%H:%M"))),
        rule_id: rule.id.clone(),
        occurrence_key: occurrence_key(instant),
        kind: NotificationKind::Primary,
        priority: NotificationPriority::Normal,
        hints: None,
    }
}

fn follow_up_payload(rule: &ReminderRule, instant: NaiveDateTime) -> NotificationPayload {
    NotificationPayload {
        title: format!("Still pending: {}", rule.title),
        body: format!("Not acknowledged since {}", instant.format("%H:%M")),
        rule_id: rule.id.clone(),
        occurrence_key: occurrence_key(instant),
        kind: NotificationKind::FollowUp,
        priority: NotificationPriority::High,
        hints: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;
    use crate::services::notifier::testing::MockNotifier;
    use crate::services::occurrence::parse_occurrence_key;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    fn dt(s: &str) -> NaiveDateTime {
        parse_occurrence_key(s).unwrap()
    }

    fn daily_rule(times: &[&str]) -> ReminderRule {
        ReminderRule {
            id: "r1".to_string(),
            title: "Drink water".to_string(),
            notes: None,
            recurrence: Recurrence::Daily {
                times_of_day: times.iter().map(|t| t.to_string()).collect(),
            },
            created_at: 1_704_067_200,
            updated_at: 1_704_067_200,
        }
    }

    #[test]
    fn schedule_persists_one_handle_per_occurrence() {
        let conn = test_conn();
        let notifier = MockNotifier::new();
        // All times are far enough out that no follow-ups get armed.
        let rule = daily_rule(&["10:00", "11:00", "12:00"]);
        let now = dt("2024-01-01T00:00");

        let handles = schedule(&conn, &notifier, &rule, now).unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(notifier.armed_count(), 3);
        assert_eq!(queries::get_primary_handles(&conn, "r1").unwrap(), handles);
    }

    #[test]
    fn partial_arm_failure_skips_only_the_failed_occurrence() {
        let conn = test_conn();
        let notifier = MockNotifier::failing_on(&[2]);
        let rule = daily_rule(&["10:00", "11:00", "12:00", "13:00", "14:00"]);
        let now = dt("2024-01-01T00:00");

        let handles = schedule(&conn, &notifier, &rule, now).unwrap();
        assert_eq!(handles.len(), 4);
        assert_eq!(notifier.armed_count(), 4);

        // The failed occurrence (11:00) was never armed; the rest exactly once.
        let armed = notifier.armed_instants();
        assert!(!armed.contains(&dt("2024-01-01T11:00")));
        assert!(armed.contains(&dt("2024-01-01T10:00")));
        assert!(armed.contains(&dt("2024-01-01T14:00")));

        assert_eq!(queries::get_primary_handles(&conn, "r1").unwrap(), handles);
    }

    #[test]
    fn all_fail_batch_still_returns_empty_success() {
        let conn = test_conn();
        let notifier = MockNotifier::failing_on(&[1, 2]);
        let rule = daily_rule(&["10:00", "11:00"]);
        let now = dt("2024-01-01T00:00");

        let handles = schedule(&conn, &notifier, &rule, now).unwrap();
        assert!(handles.is_empty());
        assert!(queries::get_primary_handles(&conn, "r1").unwrap().is_empty());
    }

    #[test]
    fn near_term_occurrence_gets_a_follow_up_burst() {
        let conn = test_conn();
        let notifier = MockNotifier::new();
        let rule = daily_rule(&["01:00"]);
        let now = dt("2024-01-01T00:00");

        schedule(&conn, &notifier, &rule, now).unwrap();

        // One primary plus a 6h burst at 5-minute cadence.
        assert_eq!(notifier.armed_count(), 1 + 72);
        let stored = queries::get_follow_up_handles(&conn, "r1", "2024-01-01T01:00:00").unwrap();
        assert_eq!(stored.len(), 72);
    }

    #[test]
    fn distant_occurrence_gets_no_follow_ups() {
        let conn = test_conn();
        let notifier = MockNotifier::new();
        let rule = daily_rule(&["10:00"]);
        let now = dt("2024-01-01T00:00");

        schedule(&conn, &notifier, &rule, now).unwrap();

        assert_eq!(notifier.armed_count(), 1);
        assert!(queries::get_follow_up_sets(&conn, "r1").unwrap().is_empty());
    }

    #[test]
    fn follow_up_instants_cover_the_remaining_tail_only() {
        // Occurrence 2h in the past: the first 24 burst slots already
        // elapsed, 48 remain, ending exactly at occurrence + 6h.
        let occurrence = dt("2024-01-01T10:00");
        let now = dt("2024-01-01T12:00");

        let instants = follow_up_instants(occurrence, now);
        assert_eq!(instants.len(), 48);
        assert_eq!(instants[0], dt("2024-01-01T12:05"));
        assert_eq!(instants[47], dt("2024-01-01T16:00"));
    }

    #[test]
    fn follow_up_instants_empty_once_horizon_elapsed() {
        let occurrence = dt("2024-01-01T02:00");
        let now = dt("2024-01-01T09:00");
        assert!(follow_up_instants(occurrence, now).is_empty());
    }

    #[test]
    fn reschedule_cancels_everything_previously_armed() {
        let conn = test_conn();
        let notifier = MockNotifier::new();
        // 01:00 is near-term, so both a primary and a follow-up set exist.
        let rule = daily_rule(&["01:00"]);
        let now = dt("2024-01-01T00:00");

        let first = schedule(&conn, &notifier, &rule, now).unwrap();
        let first_follow_ups =
            queries::get_follow_up_handles(&conn, "r1", "2024-01-01T01:00:00").unwrap();

        let second = reschedule(&conn, &notifier, &rule, now).unwrap();

        let cancelled = notifier.cancelled_handles();
        for handle in first.iter().chain(first_follow_ups.iter()) {
            assert!(cancelled.contains(handle), "missing cancel for {}", handle);
        }
        // Fresh handles replaced the old set.
        assert_ne!(first, second);
        assert_eq!(queries::get_primary_handles(&conn, "r1").unwrap(), second);
    }
}
