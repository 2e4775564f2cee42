//! `todobot` - A personal to-do list kept through a chat bot
//!
//! Users add tasks by messaging the bot (`Go shopping : tomorrow : 18:00`),
//! receive a daily digest of what is left, and manage their list from a small
//! web dashboard behind LINE Login.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod bot;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod logging;
pub mod messenger;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod todo;
pub mod web;
pub mod webhook;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use storage::{SharedStorage, Storage};
pub use todo::Todo;
