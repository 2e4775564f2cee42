//! Core to-do types for todobot.
//!
//! This module defines the task record shared by the storage layer, the chat
//! bot and the dashboard API.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A single task on a user's to-do list.
///
/// Field names on the wire match what the dashboard frontend sends and reads
/// (`ID`, `UserID`, `Task`, `Done`, `Pin`, `Due`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Identifier assigned by the storage layer.
    #[serde(rename = "ID")]
    pub id: i64,

    /// Chat user that owns this task.
    #[serde(rename = "UserID")]
    pub user_id: String,

    /// Task description.
    #[serde(rename = "Task")]
    pub task: String,

    /// Whether the task is completed.
    #[serde(rename = "Done")]
    pub done: bool,

    /// Whether the task is pinned to the top of the list.
    #[serde(rename = "Pin")]
    pub pin: bool,

    /// When the task is due.
    #[serde(rename = "Due")]
    pub due: DateTime<FixedOffset>,
}

impl Todo {
    /// Whether the task is still pending after `now`.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<FixedOffset>) -> bool {
        !self.done && now > self.due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(done: bool) -> Todo {
        Todo {
            id: 1,
            user_id: "U1".to_string(),
            task: "Go shopping".to_string(),
            done,
            pin: true,
            due: DateTime::parse_from_rfc3339("2018-11-15T15:04:00+07:00").unwrap(),
        }
    }

    #[test]
    fn test_is_overdue() {
        let before = DateTime::parse_from_rfc3339("2018-11-15T15:00:00+07:00").unwrap();
        let after = DateTime::parse_from_rfc3339("2018-11-15T16:00:00+07:00").unwrap();

        assert!(!sample(false).is_overdue(before));
        assert!(sample(false).is_overdue(after));
        assert!(!sample(true).is_overdue(after));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(sample(false)).unwrap();
        assert_eq!(json["ID"], 1);
        assert_eq!(json["UserID"], "U1");
        assert_eq!(json["Task"], "Go shopping");
        assert_eq!(json["Done"], false);
        assert_eq!(json["Pin"], true);
        assert_eq!(json["Due"], "2018-11-15T15:04:00+07:00");
    }
}
