use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;

use crate::models::{Recurrence, ReminderRule};

// ---- Reminder rules ----

pub fn get_reminder_rules(conn: &Connection) -> Result<Vec<ReminderRule>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, title, notes, recurrence, created_at, updated_at
         FROM reminder_rules
         ORDER BY created_at ASC",
    )?;

    let rules = stmt
        .query_map([], |row| {
            let recurrence_blob: Vec<u8> = row.get(3)?;
            Ok(ReminderRule {
                id: row.get(0)?,
                title: row.get(1)?,
                notes: row.get(2)?,
                recurrence: serde_json::from_slice(&recurrence_blob).unwrap_or(
                    Recurrence::Custom {
                        instants: vec![],
                        times_of_day: vec![],
                    },
                ),
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rules)
}

pub fn get_reminder_rule(conn: &Connection, rule_id: &str) -> Result<Option<ReminderRule>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, title, notes, recurrence, created_at, updated_at
         FROM reminder_rules
         WHERE uuid = ?1",
    )?;

    let rule = stmt
        .query_row([rule_id], |row| {
            let recurrence_blob: Vec<u8> = row.get(3)?;
            Ok(ReminderRule {
                id: row.get(0)?,
                title: row.get(1)?,
                notes: row.get(2)?,
                recurrence: serde_json::from_slice(&recurrence_blob).unwrap_or(
                    Recurrence::Custom {
                        instants: vec![],
                        times_of_day: vec![],
                    },
                ),
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(rule)
}

pub fn upsert_reminder_rule(conn: &Connection, rule: &ReminderRule) -> Result<()> {
    let recurrence_blob = serde_json::to_vec(&rule.recurrence)?;

    conn.execute(
        "INSERT INTO reminder_rules (uuid, title, notes, recurrence, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(uuid) DO UPDATE SET
            title = excluded.title,
            notes = excluded.notes,
            recurrence = excluded.recurrence,
            updated_at = excluded.updated_at",
        rusqlite::params![
            &rule.id,
            &rule.title,
            &rule.notes,
            &recurrence_blob,
            rule.created_at,
            rule.updated_at,
        ],
    )?;

    Ok(())
}

pub fn delete_reminder_rule(conn: &Connection, rule_id: &str) -> Result<()> {
    conn.execute("DELETE FROM reminder_rules WHERE uuid = ?1", [rule_id])?;
    Ok(())
}

// ---- Primary handle sets (one per rule) ----

pub fn get_primary_handles(conn: &Connection, rule_id: &str) -> Result<Vec<String>> {
    let blob: Option<Vec<u8>> = conn
        .query_row(
            "SELECT handles FROM primary_handles WHERE rule_uuid = ?1",
            [rule_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(blob
        .and_then(|b| serde_json::from_slice(&b).ok())
        .unwrap_or_default())
}

pub fn set_primary_handles(conn: &Connection, rule_id: &str, handles: &[String]) -> Result<()> {
    let blob = serde_json::to_vec(handles)?;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO primary_handles (rule_uuid, handles, armed_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(rule_uuid) DO UPDATE SET
            handles = excluded.handles,
            armed_at = excluded.armed_at",
        rusqlite::params![rule_id, &blob, now],
    )?;

    Ok(())
}

pub fn delete_primary_handles(conn: &Connection, rule_id: &str) -> Result<()> {
    conn.execute("DELETE FROM primary_handles WHERE rule_uuid = ?1", [rule_id])?;
    Ok(())
}

// ---- Follow-up handle sets (one per rule + occurrence) ----

pub fn get_follow_up_handles(
    conn: &Connection,
    rule_id: &str,
    occurrence_key: &str,
) -> Result<Vec<String>> {
    let blob: Option<Vec<u8>> = conn
        .query_row(
            "SELECT handles FROM followup_handles WHERE rule_uuid = ?1 AND occurrence_key = ?2",
            [rule_id, occurrence_key],
            |row| row.get(0),
        )
        .optional()?;

    Ok(blob
        .and_then(|b| serde_json::from_slice(&b).ok())
        .unwrap_or_default())
}

pub fn set_follow_up_handles(
    conn: &Connection,
    rule_id: &str,
    occurrence_key: &str,
    handles: &[String],
) -> Result<()> {
    let blob = serde_json::to_vec(handles)?;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO followup_handles (rule_uuid, occurrence_key, handles, armed_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(rule_uuid, occurrence_key) DO UPDATE SET
            handles = excluded.handles,
            armed_at = excluded.armed_at",
        rusqlite::params![rule_id, occurrence_key, &blob, now],
    )?;

    Ok(())
}

pub fn delete_follow_up_handles(
    conn: &Connection,
    rule_id: &str,
    occurrence_key: &str,
) -> Result<()> {
    conn.execute(
        "DELETE FROM followup_handles WHERE rule_uuid = ?1 AND occurrence_key = ?2",
        [rule_id, occurrence_key],
    )?;
    Ok(())
}

/// All follow-up sets for a rule, for reschedule/delete cascades.
pub fn get_follow_up_sets(conn: &Connection, rule_id: &str) -> Result<Vec<(String, Vec<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT occurrence_key, handles FROM followup_handles WHERE rule_uuid = ?1",
    )?;

    let sets = stmt
        .query_map([rule_id], |row| {
            let key: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let handles: Vec<String> = serde_json::from_slice(&blob).unwrap_or_default();
            Ok((key, handles))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sets)
}

pub fn delete_all_follow_up_handles(conn: &Connection, rule_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM followup_handles WHERE rule_uuid = ?1",
        [rule_id],
    )?;
    Ok(())
}

// ---- Acknowledgments ----

pub fn add_acknowledgment(conn: &Connection, rule_id: &str, occurrence_key: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT OR IGNORE INTO acknowledgments (rule_uuid, occurrence_key, acknowledged_at)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![rule_id, occurrence_key, now],
    )?;
    Ok(())
}

pub fn remove_acknowledgment(conn: &Connection, rule_id: &str, occurrence_key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM acknowledgments WHERE rule_uuid = ?1 AND occurrence_key = ?2",
        [rule_id, occurrence_key],
    )?;
    Ok(())
}

pub fn is_acknowledged(conn: &Connection, rule_id: &str, occurrence_key: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM acknowledgments WHERE rule_uuid = ?1 AND occurrence_key = ?2",
        [rule_id, occurrence_key],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_acknowledged_keys(conn: &Connection, rule_id: &str) -> Result<HashSet<String>> {
    let mut stmt =
        conn.prepare("SELECT occurrence_key FROM acknowledgments WHERE rule_uuid = ?1")?;

    let keys = stmt
        .query_map([rule_id], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;

    Ok(keys)
}

pub fn delete_acknowledgments(conn: &Connection, rule_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM acknowledgments WHERE rule_uuid = ?1",
        [rule_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;
    use crate::models::Recurrence;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    fn sample_rule(id: &str) -> ReminderRule {
        ReminderRule {
            id: id.to_string(),
            title: "Take medication".to_string(),
            notes: Some("with food".to_string()),
            recurrence: Recurrence::Daily {
                times_of_day: vec!["08:00".to_string()],
            },
            created_at: 1_704_067_200,
            updated_at: 1_704_067_200,
        }
    }

    #[test]
    fn rule_upsert_is_update_in_place() {
        let conn = test_conn();
        let mut rule = sample_rule("r1");
        upsert_reminder_rule(&conn, &rule).unwrap();

        rule.title = "Take medication (evening)".to_string();
        rule.updated_at = 1_704_153_600;
        upsert_reminder_rule(&conn, &rule).unwrap();

        let rules = get_reminder_rules(&conn).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].title, "Take medication (evening)");
        assert_eq!(rules[0].created_at, 1_704_067_200);
    }

    #[test]
    fn missing_handle_sets_read_as_empty() {
        let conn = test_conn();
        assert!(get_primary_handles(&conn, "nope").unwrap().is_empty());
        assert!(get_follow_up_handles(&conn, "nope", "2024-01-01T09:00:00")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn follow_up_sets_are_keyed_per_occurrence() {
        let conn = test_conn();
        set_follow_up_handles(&conn, "r1", "2024-01-01T09:00:00", &["a".to_string()]).unwrap();
        set_follow_up_handles(&conn, "r1", "2024-01-01T21:00:00", &["b".to_string()]).unwrap();

        let sets = get_follow_up_sets(&conn, "r1").unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(
            get_follow_up_handles(&conn, "r1", "2024-01-01T09:00:00").unwrap(),
            vec!["a".to_string()]
        );
    }

    #[test]
    fn acknowledgment_insert_is_idempotent() {
        let conn = test_conn();
        add_acknowledgment(&conn, "r1", "2024-01-01T09:00:00").unwrap();
        add_acknowledgment(&conn, "r1", "2024-01-01T09:00:00").unwrap();

        let keys = get_acknowledged_keys(&conn, "r1").unwrap();
        assert_eq!(keys.len(), 1);
        assert!(is_acknowledged(&conn, "r1", "2024-01-01T09:00:00").unwrap());

        remove_acknowledgment(&conn, "r1", "2024-01-01T09:00:00").unwrap();
        assert!(!is_acknowledged(&conn, "r1", "2024-01-01T09:00:00").unwrap());
    }
}
