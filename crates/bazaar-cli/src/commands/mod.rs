pub mod common;
pub mod completions;
pub mod config;
pub mod confirm;
pub mod countdown;
pub mod favorite;
pub mod notifications;
pub mod session;
