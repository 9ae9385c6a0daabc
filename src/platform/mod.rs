/// Platform integration: file writes, privileges and optional desktop capabilities

pub mod common;
pub mod notify;
pub mod tray;

pub use common::is_elevated;
pub use notify::{select_notifier, Notifier};
pub use tray::{select_tray, Tray};
