//! Command handlers.

pub mod config;
pub mod notify;
pub mod progress;
pub mod run;
pub mod session;
