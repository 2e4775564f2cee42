//! Due-date parsing and relative date formatting.
//!
//! Chat messages carry a task and a due date separated by `" : "`:
//!
//! ```text
//! Go shopping : 25/5/18 : 13:00
//! Go shopping : 25/5/18
//! Go shopping : today : 15:30
//! Go shopping : tomorrow
//! ```
//!
//! Dates are `D/M/YY` or one of the keywords `today` / `tomorrow`. When the
//! time is omitted the task is due at noon. All dates live in one fixed UTC
//! offset supplied by the caller through `now`.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Separator between the task, date and time segments of a message.
pub const SEPARATOR: &str = " : ";

/// Time used when a message gives only a date.
pub const DEFAULT_DUE_TIME: NaiveTime = match NaiveTime::from_hms_opt(12, 0, 0) {
    Some(noon) => noon,
    None => panic!("12:00 is a valid time"),
};

/// Why a chat message could not be turned into a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The message does not have two or three segments.
    #[error("wrong format: expected `task : date` or `task : date : time`")]
    WrongFormat,

    /// The task segment is blank.
    #[error("wrong format: task is empty")]
    EmptyTask,

    /// The date segment is neither a keyword nor a valid `D/M/YY` date.
    #[error("wrong format: invalid date `{0}`")]
    InvalidDate(String),

    /// The time segment is not a valid `H:MM` time.
    #[error("wrong format: invalid time `{0}`")]
    InvalidTime(String),
}

/// A task extracted from a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    /// The task description.
    pub task: String,
    /// When the task is due.
    pub due: DateTime<FixedOffset>,
}

/// Build a fixed offset from a number of minutes east of UTC.
#[must_use]
pub fn fixed_offset(utc_offset_minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)
}

/// The current instant in the given offset.
#[must_use]
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// Parse a chat message into a task and its due date.
///
/// `today` and `tomorrow` resolve against `now`, and the result carries the
/// offset of `now`.
///
/// # Errors
///
/// Returns a [`ParseError`] when the message has the wrong number of
/// segments, an empty task, or an invalid date or time.
pub fn parse_user_message(
    msg: &str,
    now: DateTime<FixedOffset>,
) -> Result<ParsedTask, ParseError> {
    let segments: Vec<&str> = msg.split(SEPARATOR).map(str::trim).collect();

    let (task, date, time) = match segments.as_slice() {
        [task, date] => (*task, *date, None),
        [task, date, time] => (*task, *date, Some(*time)),
        _ => return Err(ParseError::WrongFormat),
    };

    if task.is_empty() {
        return Err(ParseError::EmptyTask);
    }

    let date = resolve_date(date, now.date_naive())?;
    let time = match time {
        Some(time) => parse_time(time)?,
        None => DEFAULT_DUE_TIME,
    };

    let due = date
        .and_time(time)
        .and_local_timezone(*now.offset())
        .single()
        .ok_or_else(|| ParseError::InvalidDate(date.to_string()))?;

    Ok(ParsedTask {
        task: task.to_string(),
        due,
    })
}

/// Resolve a date segment: a keyword or a `D/M/YY` date.
fn resolve_date(word: &str, today: NaiveDate) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::InvalidDate(word.to_string());

    match word.to_lowercase().as_str() {
        "today" => Ok(today),
        "tomorrow" => today.succ_opt().ok_or_else(invalid),
        _ => parse_date(word).ok_or_else(invalid),
    }
}

/// Parse `D/M/YY`: day and month take one or two digits, the year exactly two.
fn parse_date(word: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = word.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };

    let day = parse_digits(day, 1, 2)?;
    let month = parse_digits(month, 1, 2)?;
    let year = parse_digits(year, 2, 2)?;

    // Two-digit years pivot at 69, as in POSIX strptime.
    let year = if year >= 69 { 1900 + year } else { 2000 + year };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Parse `H:MM`: hour takes one or two digits, minutes exactly two.
fn parse_time(word: &str) -> Result<NaiveTime, ParseError> {
    let invalid = || ParseError::InvalidTime(word.to_string());

    let (hour, minute) = word.split_once(':').ok_or_else(invalid)?;
    let hour = parse_digits(hour, 1, 2).ok_or_else(invalid)?;
    let minute = parse_digits(minute, 2, 2).ok_or_else(invalid)?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

fn parse_digits(s: &str, min_len: usize, max_len: usize) -> Option<u32> {
    if s.len() < min_len || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Describe `due` relative to `now` for reminder messages.
///
/// The description is one of, in order of precedence:
/// `Today at 15:04`, `Tomorrow at 15:04`, `Yesterday at 15:04`,
/// `Last Tue at 15:04` (earlier this week), `Sat at 15:04` (later this week),
/// `Next Tue at 15:04` (next week), or `Sat 10 Nov 18 at 15:04`.
/// Weeks start on Monday.
#[must_use]
pub fn format_due(now: DateTime<FixedOffset>, due: DateTime<FixedOffset>) -> String {
    let due = due.with_timezone(now.offset());
    let today = now.date_naive();
    let day = due.date_naive();
    let clock = due.format("%H:%M");

    if day == today {
        return format!("Today at {clock}");
    }
    if today.succ_opt() == Some(day) {
        return format!("Tomorrow at {clock}");
    }
    if today.pred_opt() == Some(day) {
        return format!("Yesterday at {clock}");
    }

    let weeks_apart = week_start(day)
        .signed_duration_since(week_start(today))
        .num_days();
    let weekday = due.format("%a at %H:%M");

    match weeks_apart {
        0 if now > due => format!("Last {weekday}"),
        0 => weekday.to_string(),
        7 => format!("Next {weekday}"),
        _ => due.format("%a %-d %b %y at %H:%M").to_string(),
    }
}

/// The Monday starting the week that contains `day`.
fn week_start(day: NaiveDate) -> NaiveDate {
    let since_monday = u64::from(day.weekday().num_days_from_monday());
    day.checked_sub_days(Days::new(since_monday)).unwrap_or(day)
}
