use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub mod schema;
pub mod queries;

pub fn init_database(db_path: &Path) -> Result<Connection> {
    let conn = open(db_path)?;
    schema::create_tables(&conn)?;
    Ok(conn)
}

/// Connection for command and service use. Commands and the refresh loop
/// each open short-lived connections that can overlap, so every handle gets
/// WAL mode and a busy timeout.
pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.pragma_update(None, "journal_mode", &"WAL")?;
    conn.pragma_update(None, "synchronous", &"NORMAL")?;
    conn.pragma_update(None, "foreign_keys", &"ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;

    Ok(conn)
}
