//! Storage layer for todobot.
//!
//! This module provides `SQLite`-based persistent storage for tasks. Every
//! mutation is scoped to the owning user, so a dashboard session can only
//! touch its own tasks.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::todo::Todo;

/// Columns selected for every todo query, in `row_to_todo` order.
const TODO_COLUMNS: &str = "id, user_id, task, done, pin, due";

/// Storage engine for tasks.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Offset that due dates are returned in.
    offset: FixedOffset,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database. Due dates read back
    /// are expressed in `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, offset: FixedOffset) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn, offset })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(offset: FixedOffset) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            offset,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the offset due dates are returned in.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Store a new pending, unpinned task for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create(&self, user_id: &str, task: &str, due: DateTime<FixedOffset>) -> Result<Todo> {
        self.conn.execute(
            "INSERT INTO todos (user_id, task, due) VALUES (?1, ?2, ?3)",
            params![user_id, task, encode_due(due)],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Created todo {} for user {}", id, user_id);
        Ok(Todo {
            id,
            user_id: user_id.to_string(),
            task: task.to_string(),
            done: false,
            pin: false,
            due: due.with_timezone(&self.offset),
        })
    }

    /// Get a task by its ID, regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<Todo>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
                [id],
                |row| row_to_todo(row, self.offset),
            )
            .optional()?;
        Ok(result)
    }

    /// List a user's tasks: pending first, pinned first, then by due date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, user_id: &str) -> Result<Vec<Todo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ?1 ORDER BY done, pin DESC, due, id"
        ))?;

        let todos = stmt
            .query_map([user_id], |row| row_to_todo(row, self.offset))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(todos)
    }

    /// Pin or unpin a user's task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TodoNotFound`] if the user has no such task.
    pub fn set_pin(&self, user_id: &str, id: i64, pin: bool) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE todos SET pin = ?1 WHERE id = ?2 AND user_id = ?3",
            params![pin, id, user_id],
        )?;
        expect_one(affected, id)
    }

    /// Mark a user's task done or pending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TodoNotFound`] if the user has no such task.
    pub fn set_done(&self, user_id: &str, id: i64, done: bool) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE todos SET done = ?1 WHERE id = ?2 AND user_id = ?3",
            params![done, id, user_id],
        )?;
        expect_one(affected, id)
    }

    /// Change the description and due date of a user's task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TodoNotFound`] if the user has no such task.
    pub fn edit(
        &self,
        user_id: &str,
        id: i64,
        task: &str,
        due: DateTime<FixedOffset>,
    ) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE todos SET task = ?1, due = ?2 WHERE id = ?3 AND user_id = ?4",
            params![task, encode_due(due), id, user_id],
        )?;
        expect_one(affected, id)
    }

    /// Delete a user's task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TodoNotFound`] if the user has no such task.
    pub fn delete(&self, user_id: &str, id: i64) -> Result<()> {
        let affected = self.conn.execute(
            "DELETE FROM todos WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        expect_one(affected, id)
    }

    /// All tasks grouped by user, each group ordered pending first, pinned
    /// first, then by due date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remind(&self) -> Result<BTreeMap<String, Vec<Todo>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TODO_COLUMNS} FROM todos ORDER BY user_id, done, pin DESC, due, id"
        ))?;

        let mut by_user: BTreeMap<String, Vec<Todo>> = BTreeMap::new();
        for todo in stmt.query_map([], |row| row_to_todo(row, self.offset))? {
            let todo = todo?;
            by_user.entry(todo.user_id.clone()).or_default().push(todo);
        }

        debug!("Loaded reminders for {} users", by_user.len());
        Ok(by_user)
    }

    /// Count total tasks in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM todos", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// A storage handle shared between request handlers and background tasks.
///
/// The lock is held for one call at a time and never across an `.await`.
#[derive(Debug, Clone)]
pub struct SharedStorage(Arc<Mutex<Storage>>);

impl SharedStorage {
    /// Wrap a storage engine for shared use.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self(Arc::new(Mutex::new(storage)))
    }

    /// Run `f` with exclusive access to the storage engine.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an internal error if the lock is poisoned.
    pub fn with<T>(&self, f: impl FnOnce(&Storage) -> Result<T>) -> Result<T> {
        let storage = self
            .0
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        f(&storage)
    }
}

fn encode_due(due: DateTime<FixedOffset>) -> String {
    due.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn expect_one(affected: usize, id: i64) -> Result<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(Error::TodoNotFound { id })
    }
}

fn row_to_todo(row: &rusqlite::Row, offset: FixedOffset) -> rusqlite::Result<Todo> {
    let due_str: String = row.get(5)?;
    let due = DateTime::parse_from_rfc3339(&due_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&offset);

    Ok(Todo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task: row.get(2)?,
        done: row.get(3)?,
        pin: row.get(4)?,
        due,
    })
}
