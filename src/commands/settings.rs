use anyhow::{Context, Result};
use std::path::Path;

use super::admin::{open_app, prompt_line, require_admin};
use super::utils::write_settings;

/// Show current settings
pub fn show(config: Option<&Path>) -> Result<()> {
    let app = open_app(config)?;
    write_settings(&mut std::io::stdout(), app.config(), app.uses_default_password())?;
    println!();
    println!("Configuration file: {}", app.config_path().display());
    Ok(())
}

/// Change one setting
pub fn set(config: Option<&Path>, password: Option<&str>, key: &str, value: &str) -> Result<()> {
    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    app.set_setting(key, value)?;
    println!("✓ {} updated", key);
    Ok(())
}

/// Change the admin password
///
/// The current password comes from `--password` or a prompt; the new one is
/// always read from stdin twice.
pub fn change_password(config: Option<&Path>, password: Option<&str>) -> Result<()> {
    let mut app = open_app(config)?;
    let current = match password {
        Some(password) => password.to_string(),
        None => prompt_line("Current password: ")?.context("No password provided")?,
    };
    require_admin(&mut app, Some(&current))?;

    let new_password = prompt_line("New password: ")?.context("No new password provided")?;
    let confirm = prompt_line("Confirm new password: ")?.context("No confirmation provided")?;

    app.change_password(&current, &new_password, &confirm)?;
    println!("✓ Password changed");
    Ok(())
}
