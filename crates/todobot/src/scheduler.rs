//! Built-in daily reminder timer.
//!
//! When `reminder.daily_at` is configured the server runs a [`DailyReminder`]
//! alongside the HTTP listener. Deployments that trigger `/remind` or
//! `todobot remind` from cron leave it unset.

use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bot::TodoBot;
use crate::dates::now_in;

/// The first instant after `now` whose local time of day is `at`.
#[must_use]
pub fn next_run(now: DateTime<FixedOffset>, at: NaiveTime) -> DateTime<FixedOffset> {
    let mut day = now.date_naive();
    if now.time() >= at {
        day = day.checked_add_days(Days::new(1)).unwrap_or(day);
    }
    day.and_time(at)
        .and_local_timezone(*now.offset())
        .single()
        .unwrap_or(now)
}

/// Sends reminders once a day at a fixed local time.
#[derive(Debug)]
pub struct DailyReminder {
    bot: Arc<TodoBot>,
    at: NaiveTime,
    offset: FixedOffset,
    clock: fn(FixedOffset) -> DateTime<FixedOffset>,
}

impl DailyReminder {
    /// Create a timer that runs `bot.remind` every day at `at` in `offset`.
    #[must_use]
    pub fn new(bot: Arc<TodoBot>, at: NaiveTime, offset: FixedOffset) -> Self {
        Self {
            bot,
            at,
            offset,
            clock: now_in,
        }
    }

    /// Run forever. Abort the task to stop it.
    ///
    /// Each run is scheduled after the previous one, so a wall clock that
    /// steps backwards cannot repeat a day.
    pub async fn run(self) {
        let mut last: Option<DateTime<FixedOffset>> = None;
        loop {
            let now = (self.clock)(self.offset);
            let next = next_run(last.map_or(now, |last| last.max(now)), self.at);
            info!(next = %next, "Next daily reminder scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            last = Some(next);

            match self.bot.remind((self.clock)(self.offset)) {
                Ok(handles) => debug!(users = handles.len(), "Daily reminders dispatched"),
                Err(e) => warn!(error = %e, "Daily reminder run failed"),
            }
        }
    }

    /// Run on a background task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
