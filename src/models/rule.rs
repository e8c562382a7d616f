use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRule {
    pub id: String,
    pub title: String,
    pub notes: Option<String>,
    pub recurrence: Recurrence,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Recurrence is stored as a JSON blob in sqlite, so the tag names here are
/// part of the on-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    Daily {
        times_of_day: Vec<String>,
    },
    EveryNDays {
        times_of_day: Vec<String>,
        interval: u32,
        anchor_date: Option<NaiveDate>,
    },
    /// Explicit one-shot instants, serialized as local wall-clock
    /// `YYYY-MM-DDTHH:MM:SS` strings. `times_of_day` only matters for the
    /// legacy no-instants fallback and is empty for rules created through
    /// the normal flow.
    Custom {
        #[serde(default)]
        instants: Vec<String>,
        #[serde(default)]
        times_of_day: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReminderRequest {
    pub id: Option<String>,
    pub title: String,
    pub notes: Option<String>,
    pub recurrence: Recurrence,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("reminder title must not be empty")]
    EmptyTitle,
    #[error("at least one time of day is required")]
    EmptyTimes,
    #[error("invalid time of day '{0}', expected HH:MM")]
    BadTimeOfDay(String),
    #[error("repeat interval must be at least 1 day, got {0}")]
    BadInterval(u32),
    #[error("invalid custom instant '{0}'")]
    BadInstant(String),
}

fn time_of_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}$").expect("valid time-of-day regex"))
}

impl ReminderRule {
    /// Boundary validation for user-supplied rules. Stored rules are never
    /// re-validated; expansion parses them leniently instead (see
    /// `services::occurrence`).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        match &self.recurrence {
            Recurrence::Daily { times_of_day } => validate_times(times_of_day),
            Recurrence::EveryNDays {
                times_of_day,
                interval,
                ..
            } => {
                if *interval < 1 {
                    return Err(ValidationError::BadInterval(*interval));
                }
                validate_times(times_of_day)
            }
            Recurrence::Custom { instants, .. } => {
                for raw in instants {
                    if crate::services::occurrence::parse_occurrence_key(raw).is_none() {
                        return Err(ValidationError::BadInstant(raw.clone()));
                    }
                }
                Ok(())
            }
        }
    }
}

fn validate_times(times: &[String]) -> Result<(), ValidationError> {
    if times.is_empty() {
        return Err(ValidationError::EmptyTimes);
    }
    for time in times {
        if !time_of_day_re().is_match(time.trim()) {
            return Err(ValidationError::BadTimeOfDay(time.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_with(recurrence: Recurrence) -> ReminderRule {
        ReminderRule {
            id: "r1".to_string(),
            title: "Water the plants".to_string(),
            notes: None,
            recurrence,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    #[test]
    fn accepts_well_formed_daily_rule() {
        let rule = rule_with(Recurrence::Daily {
            times_of_day: vec!["09:00".to_string(), "21:30".to_string()],
        });
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn rejects_empty_time_list() {
        let rule = rule_with(Recurrence::Daily {
            times_of_day: vec![],
        });
        assert!(matches!(rule.validate(), Err(ValidationError::EmptyTimes)));
    }

    #[test]
    fn rejects_malformed_time_of_day() {
        let rule = rule_with(Recurrence::Daily {
            times_of_day: vec!["quarter past nine".to_string()],
        });
        assert!(matches!(
            rule.validate(),
            Err(ValidationError::BadTimeOfDay(_))
        ));
    }

    #[test]
    fn rejects_zero_interval() {
        let rule = rule_with(Recurrence::EveryNDays {
            times_of_day: vec!["10:00".to_string()],
            interval: 0,
            anchor_date: None,
        });
        assert!(matches!(
            rule.validate(),
            Err(ValidationError::BadInterval(0))
        ));
    }

    #[test]
    fn rejects_unparseable_custom_instant() {
        let rule = rule_with(Recurrence::Custom {
            instants: vec!["next tuesday-ish".to_string()],
            times_of_day: vec![],
        });
        assert!(matches!(rule.validate(), Err(ValidationError::BadInstant(_))));
    }

    #[test]
    fn custom_rule_without_instants_is_valid() {
        // Legacy shape: instants absent, times only. Still accepted.
        let rule = rule_with(Recurrence::Custom {
            instants: vec![],
            times_of_day: vec!["09:00".to_string()],
        });
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn recurrence_round_trips_through_json() {
        let recurrence = Recurrence::EveryNDays {
            times_of_day: vec!["08:15".to_string()],
            interval: 3,
            anchor_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        let json = serde_json::to_string(&recurrence).unwrap();
        assert!(json.contains("every_n_days"));
        let back: Recurrence = serde_json::from_str(&json).unwrap();
        match back {
            Recurrence::EveryNDays { interval, .. } => assert_eq!(interval, 3),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
