use anyhow::Result;
use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> Result<()> {
    // Reminder rules table. Recurrence is a serialized JSON blob; its shape
    // is owned by models::rule.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS reminder_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            notes TEXT,
            recurrence BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Primary notification handles, one row per rule.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS primary_handles (
            rule_uuid TEXT PRIMARY KEY,
            handles BLOB NOT NULL,
            armed_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Follow-up notification handles, one row per (rule, occurrence).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS followup_handles (
            rule_uuid TEXT NOT NULL,
            occurrence_key TEXT NOT NULL,
            handles BLOB NOT NULL,
            armed_at INTEGER NOT NULL,
            PRIMARY KEY (rule_uuid, occurrence_key)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_followup_handles_rule ON followup_handles(rule_uuid)",
        [],
    )?;

    // Acknowledged occurrences. Presence of a row means "handled".
    conn.execute(
        "CREATE TABLE IF NOT EXISTS acknowledgments (
            rule_uuid TEXT NOT NULL,
            occurrence_key TEXT NOT NULL,
            acknowledged_at INTEGER NOT NULL,
            PRIMARY KEY (rule_uuid, occurrence_key)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_acknowledgments_rule ON acknowledgments(rule_uuid)",
        [],
    )?;

    Ok(())
}
