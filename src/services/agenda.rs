use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::database::queries;
use crate::models::{AgendaItem, AgendaView, ReminderRule};
use crate::services::occurrence::{
    self, occurrence_key, AGENDA_LOOKAHEAD_HOURS, AGENDA_LOOKBACK_HOURS,
};

/// Derives the user-facing view for "right now": future occurrences within
/// the next 24 hours and missed, unacknowledged occurrences from the last
/// 6 hours. Occurrences are recomputed from the rules on every call; stored
/// notification handles are never consulted.
pub fn agenda_view(
    conn: &Connection,
    rules: &[ReminderRule],
    now: NaiveDateTime,
) -> Result<AgendaView> {
    let window_start = now - Duration::hours(AGENDA_LOOKBACK_HOURS);
    let window_end = now + Duration::hours(AGENDA_LOOKAHEAD_HOURS);

    let mut upcoming = Vec::new();
    let mut active = Vec::new();

    for rule in rules {
        let acknowledged_keys = queries::get_acknowledged_keys(conn, &rule.id)?;

        for instant in occurrence::occurrences_in_window(rule, window_start, window_end) {
            let key = occurrence_key(instant);
            let acknowledged = acknowledged_keys.contains(&key);

            if instant >= now {
                upcoming.push(make_item(rule, instant, key, acknowledged));
            } else if !acknowledged {
                // Past, within the lookback, unhandled: actionable.
                active.push(make_item(rule, instant, key, false));
            }
            // Acknowledged past occurrences are dropped entirely.
        }
    }

    upcoming.sort_by_key(|item| item.instant);
    active.sort_by(|a, b| b.instant.cmp(&a.instant));

    Ok(AgendaView { upcoming, active })
}

fn make_item(
    rule: &ReminderRule,
    instant: NaiveDateTime,
    key: String,
    acknowledged: bool,
) -> AgendaItem {
    AgendaItem {
        rule_id: rule.id.clone(),
        title: rule.title.clone(),
        instant,
        occurrence_key: key,
        label: instant.format("%a %-d %b, %H:%M").to_string(),
        acknowledged,
    }
}
