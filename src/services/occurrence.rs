use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{Recurrence, ReminderRule};

/// How far ahead day-granularity recurrences are pre-armed.
pub const RECURRENCE_HORIZON_DAYS: i64 = 365;
/// Daily rules are armed on a rolling window and re-armed by the refresh
/// service, so a short horizon is enough.
pub const DAILY_HORIZON_HOURS: i64 = 24;
/// Occurrences within this distance of "now" get a follow-up burst.
pub const FOLLOW_UP_HORIZON_MINS: i64 = 6 * 60;
/// Cadence of the follow-up burst.
pub const FOLLOW_UP_CADENCE_MINS: i64 = 5;
/// Agenda window: how far back a missed occurrence stays actionable.
pub const AGENDA_LOOKBACK_HOURS: i64 = 6;
/// Agenda window: how far ahead the upcoming list reaches.
pub const AGENDA_LOOKAHEAD_HOURS: i64 = 24;

const OCCURRENCE_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Canonical identity of one occurrence instant. Doubles as the lookup key
/// for acknowledgments and follow-up handle sets.
pub fn occurrence_key(instant: NaiveDateTime) -> String {
    instant.format(OCCURRENCE_KEY_FORMAT).to_string()
}

/// Inverse of `occurrence_key`. Also accepts the seconds-less form that
/// older rules stored for custom instants.
pub fn parse_occurrence_key(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, OCCURRENCE_KEY_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Lenient `HH:MM` parse. Stored rules may predate input validation, so a
/// malformed component falls back (hour 9, minute 0) instead of failing the
/// whole rule.
pub fn parse_time_of_day(raw: &str) -> NaiveTime {
    let mut parts = raw.trim().splitn(2, ':');
    let hour = parts
        .next()
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(9);
    let minute = parts
        .next()
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(0);
    NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN)
}

/// Expands a rule into its concrete occurrence instants inside
/// `[window_start, window_end]` (both bounds inclusive), ascending.
/// Duplicate times in a rule produce duplicate instants on purpose: each
/// one maps to its own notification handle.
pub fn occurrences_in_window(
    rule: &ReminderRule,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<NaiveDateTime> {
    if window_end < window_start {
        return Vec::new();
    }

    let mut occurrences = match &rule.recurrence {
        Recurrence::Daily { times_of_day } => {
            day_time_cross(times_of_day, window_start, window_end, |_| true)
        }
        Recurrence::EveryNDays {
            times_of_day,
            interval,
            anchor_date,
        } => {
            let anchor = resolve_anchor(rule, *anchor_date, window_start);
            let interval = (*interval).max(1) as i64;
            day_time_cross(times_of_day, window_start, window_end, |day| {
                (day - anchor).num_days().rem_euclid(interval) == 0
            })
        }
        Recurrence::Custom {
            instants,
            times_of_day,
        } => {
            if instants.is_empty() {
                // Legacy fallback: a custom rule saved without instants is
                // read as "today's times", pinned to the window start date.
                let today = window_start.date();
                times_of_day
                    .iter()
                    .map(|t| today.and_time(parse_time_of_day(t)))
                    .filter(|i| *i >= window_start && *i <= window_end)
                    .collect()
            } else {
                instants
                    .iter()
                    .filter_map(|raw| parse_occurrence_key(raw))
                    .filter(|i| *i >= window_start && *i <= window_end)
                    .collect()
            }
        }
    };

    occurrences.sort();
    occurrences
}

/// Membership test: is `instant` one of the rule's occurrences? Debug/UI
/// helper, the scheduling paths re-derive full windows instead.
#[allow(dead_code)]
pub fn is_occurrence(rule: &ReminderRule, instant: NaiveDateTime) -> bool {
    occurrences_in_window(rule, instant, instant)
        .iter()
        .any(|i| *i == instant)
}

/// Anchor resolution for every-N-days cadence: explicit anchor date first,
/// then the rule's creation date.
fn resolve_anchor(
    rule: &ReminderRule,
    anchor_date: Option<NaiveDate>,
    window_start: NaiveDateTime,
) -> NaiveDate {
    anchor_date
        .or_else(|| DateTime::from_timestamp(rule.created_at, 0).map(|dt| dt.date_naive()))
        .unwrap_or_else(|| window_start.date())
}

fn day_time_cross<F>(
    times_of_day: &[String],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    keep_day: F,
) -> Vec<NaiveDateTime>
where
    F: Fn(NaiveDate) -> bool,
{
    let mut out = Vec::new();
    let mut day = window_start.date();
    while day <= window_end.date() {
        if keep_day(day) {
            for time in times_of_day {
                let instant = day.and_time(parse_time_of_day(time));
                if instant >= window_start && instant <= window_end {
                    out.push(instant);
                }
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    out
}
