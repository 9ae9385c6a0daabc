use anyhow::Result;
use chrono::Local;
use std::path::Path;

use crate::console::parse::window_from;
use crate::schedule::ClockTime;

use super::admin::{open_app, require_admin};
use super::utils::write_rules;

/// List blocked applications
pub fn list(config: Option<&Path>) -> Result<()> {
    let app = open_app(config)?;
    write_rules(&mut std::io::stdout(), &app.config().rules, Local::now().time())?;
    Ok(())
}

/// Block an application
pub fn add(
    config: Option<&Path>,
    password: Option<&str>,
    path: String,
    name: Option<String>,
    from: Option<ClockTime>,
    to: Option<ClockTime>,
) -> Result<()> {
    let window = window_from(from, to)?;
    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    let replaced = app.add_rule(&path, name, window, true)?;
    if let Some(rule) = app.config().find_rule(path.trim()) {
        let verb = if replaced.is_some() { "Updated" } else { "Blocked" };
        println!("✓ {} {} ({})", verb, rule.name, rule.schedule_label());
    }
    println!("  Saved to: {}", app.config_path().display());

    Ok(())
}

/// Stop blocking an application
pub fn remove(config: Option<&Path>, password: Option<&str>, key: &str) -> Result<()> {
    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    let removed = app.remove_rule(key)?;
    println!("✓ Removed {} ({})", removed.name, removed.path);
    Ok(())
}

/// Mark a rule active or inactive
pub fn set_enabled(config: Option<&Path>, password: Option<&str>, key: &str, enabled: bool) -> Result<()> {
    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    let rule = app.set_rule_enabled(key, enabled)?;
    println!(
        "✓ {} {}",
        if enabled { "Enabled" } else { "Disabled" },
        rule.name
    );
    Ok(())
}
