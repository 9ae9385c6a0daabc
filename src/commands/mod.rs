pub mod admin;
pub mod monitor;
pub mod processes;
pub mod rules;
pub mod session;
pub mod settings;
pub mod transfer;
pub mod utils;
