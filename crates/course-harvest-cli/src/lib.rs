//! Course Harvest CLI: config resolution and command implementations.

pub mod commands;
pub mod config;
pub mod output;

pub use config::{resolve_cookie_path, resolve_db_path};
