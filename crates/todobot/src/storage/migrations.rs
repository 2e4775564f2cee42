//! Versioned schema upgrades.
//!
//! Each entry in [`MIGRATIONS`] moves the database one version forward and is
//! applied inside its own transaction together with the version bump, so a
//! failed upgrade leaves the previous version intact.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, CREATE_TODOS_TABLE, CREATE_USER_INDEX};

/// Schema version this build reads and writes.
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

const VERSION_KEY: &str = "schema_version";

/// Statements for each version, starting at version 1.
const MIGRATIONS: &[&[&str]] = &[&[CREATE_TODOS_TABLE, CREATE_USER_INDEX]];

/// Bring the database at `conn` up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Fails when the stored version is unreadable or newer than this build, or
/// when a migration statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let found = stored_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {found} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for version in found + 1..=CURRENT_VERSION {
        apply(conn, version)?;
    }
    if found < CURRENT_VERSION {
        info!(from = found, to = CURRENT_VERSION, "Database schema upgraded");
    }
    Ok(())
}

/// 0 for a database that has never been initialized.
fn stored_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn apply(conn: &Connection, version: i32) -> Result<()> {
    let statements = usize::try_from(version - 1)
        .ok()
        .and_then(|index| MIGRATIONS.get(index))
        .ok_or_else(|| Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        })?;

    debug!(version, "Applying migration");
    let tx = conn.unchecked_transaction()?;
    for statement in *statements {
        tx.execute(statement, [])?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    tx.commit()?;
    Ok(())
}
