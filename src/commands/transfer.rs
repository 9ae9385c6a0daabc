use anyhow::Result;
use std::path::Path;

use super::admin::{open_app, require_admin};

/// Export the configuration
///
/// The export carries the password hash, so it needs the admin password too.
pub fn export(config: Option<&Path>, password: Option<&str>, file: &Path) -> Result<()> {
    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    app.export(file)?;
    println!("✓ Exported configuration to {}", file.display());
    Ok(())
}

/// Import a configuration file
pub fn import(config: Option<&Path>, password: Option<&str>, file: &Path) -> Result<()> {
    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    let count = app.import(file)?;
    println!("✓ Imported {} rule(s) from {}", count, file.display());
    println!("  Saved to: {}", app.config_path().display());
    Ok(())
}
