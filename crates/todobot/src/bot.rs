//! Chat bot behavior.
//!
//! [`TodoBot`] turns webhook events into stored tasks and replies, and sends
//! each user a daily digest of their list.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dates::{format_due, parse_user_message};
use crate::error::{Error, Result};
use crate::messenger::Messenger;
use crate::storage::SharedStorage;
use crate::todo::Todo;
use crate::webhook::{Event, Message};

/// Help text sent when a message cannot be parsed.
pub const HOWTO: &str = "You can create todo list by using these formats:
\t1) Go shopping : 25/5/18 : 13:00
\t2) Go shopping : 25/5/18
\t3) Go shopping : today : 15:30
\t4) Go shopping : today
\t5) Go shopping : tomorrow : 18:00
\t6) Go shopping : tomorrow
You can edit todo list by input word \"edit\"";

/// Greeting sent when the bot is added.
pub const GREETING: &str =
    "Thanks for adding me. I'm Todo Bot, I'm here to help you to manage your tasks.";

/// Reply sent after a task is stored.
pub const CREATED_REPLY: &str = "Task has been created.";

/// Message that asks for the dashboard link.
pub const EDIT_KEYWORD: &str = "edit";

/// The chat bot.
pub struct TodoBot {
    storage: SharedStorage,
    messenger: Arc<dyn Messenger>,
    edit_url: String,
}

impl fmt::Debug for TodoBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoBot")
            .field("storage", &self.storage)
            .field("edit_url", &self.edit_url)
            .finish_non_exhaustive()
    }
}

impl TodoBot {
    /// Create a bot storing tasks in `storage` and talking through `messenger`.
    #[must_use]
    pub fn new(
        storage: SharedStorage,
        messenger: Arc<dyn Messenger>,
        edit_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            messenger,
            edit_url: edit_url.into(),
        }
    }

    /// Handle webhook events in order.
    ///
    /// A failed reply is logged and does not stop the remaining events.
    pub async fn handle_events(&self, events: &[Event], now: DateTime<FixedOffset>) {
        for event in events {
            let (reply_token, reply) = match event {
                Event::Message {
                    reply_token,
                    source,
                    message: Message::Text { text },
                } => (
                    reply_token,
                    self.reply_for_text(source.user_id.as_deref(), text, now),
                ),
                Event::Join { reply_token, .. } | Event::Follow { reply_token, .. } => {
                    (reply_token, format!("{GREETING}\n{HOWTO}"))
                }
                Event::Message { .. } | Event::Other => continue,
            };

            if let Err(e) = self.messenger.reply(reply_token, &reply).await {
                warn!("Failed to reply to webhook event: {}", e);
            }
        }
    }

    /// Work out the reply to a text message, storing a task when it parses.
    pub fn reply_for_text(
        &self,
        user_id: Option<&str>,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> String {
        if text.trim().eq_ignore_ascii_case(EDIT_KEYWORD) {
            return format!("Please go to {}", self.edit_url);
        }

        let parsed = match parse_user_message(text, now) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Unparseable message {:?}: {}", text, e);
                return HOWTO.to_string();
            }
        };

        let Some(user_id) = user_id else {
            return Error::unauthorized("message has no user id").to_string();
        };

        match self
            .storage
            .with(|s| s.create(user_id, &parsed.task, parsed.due))
        {
            Ok(todo) => {
                info!("Created todo {} for user {}", todo.id, user_id);
                CREATED_REPLY.to_string()
            }
            Err(e) => {
                warn!("Failed to create todo for user {}: {}", user_id, e);
                e.to_string()
            }
        }
    }

    /// Push every user a digest of their tasks.
    ///
    /// Each push runs as its own task; failures are logged. The returned
    /// handles may be awaited or dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the tasks cannot be loaded.
    pub fn remind(&self, now: DateTime<FixedOffset>) -> Result<Vec<JoinHandle<()>>> {
        let reminders = self.storage.with(|s| s.remind())?;
        info!("Sending reminders to {} users", reminders.len());

        let handles = reminders
            .into_iter()
            .map(|(user_id, todos)| {
                let message = compose_reminder(now, &todos);
                let messenger = Arc::clone(&self.messenger);
                tokio::spawn(async move {
                    if let Err(e) = messenger.push(&user_id, &message).await {
                        warn!("Failed to push reminder to {}: {}", user_id, e);
                    }
                })
            })
            .collect();

        Ok(handles)
    }
}

/// Build the reminder digest for one user's tasks.
///
/// `todos` must be ordered pending first, as [`crate::Storage::remind`] returns them.
#[must_use]
pub fn compose_reminder(now: DateTime<FixedOffset>, todos: &[Todo]) -> String {
    let mut message = String::from("Hi there,\n");
    let mut shown_done = false;
    let mut remaining = 0;

    for (i, todo) in todos.iter().enumerate() {
        if i == 0 {
            if todo.done {
                message.push_str("Well done, you have no remaining tasks to be done :)\n");
            } else {
                message.push_str("Tasks to be done:\n");
            }
        }

        if !todo.done {
            remaining += 1;
        } else if !shown_done {
            message.push_str("Tasks completed:\n");
            shown_done = true;
        }

        message.push_str(if todo.pin { "*** " } else { "    " });
        message.push_str(&todo.task);
        message.push_str(" : ");
        message.push_str(&format_due(now, todo.due));
        if todo.is_overdue(now) {
            message.push_str(" (overdue)");
        }
        message.push('\n');
    }

    if remaining != 0 {
        message.push_str(&format!(
            "{remaining} of {} remaining, just do it!",
            todos.len()
        ));
    }
    message
}
