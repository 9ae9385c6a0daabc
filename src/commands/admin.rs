use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::app::AppLock;
use crate::auth::{AuthGate, AuthOutcome};
use crate::config;

/// Resolve the configuration path from `--config` or the per-user default
pub fn config_path(config: Option<&Path>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => config::get_config_path(),
    }
}

/// Load the application state for a one-shot command
pub fn open_app(config: Option<&Path>) -> Result<AppLock> {
    let path = config_path(config)?;
    AppLock::open(&path)
        .with_context(|| format!("Failed to open configuration at {}", path.display()))
}

/// Print a prompt to stderr and read one line from stdin
pub fn prompt_line(prompt: &str) -> Result<Option<String>> {
    eprint!("{}", prompt);
    io::stderr().flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Check the admin password before a privileged command
///
/// A password given on the command line gets exactly one attempt. Without
/// one, the password is prompted for until it is accepted, the lockout
/// kicks in, or stdin ends.
pub fn require_admin(app: &mut AppLock, password: Option<&str>) -> Result<()> {
    let mut gate = AuthGate::default();

    if let Some(password) = password {
        let outcome = app.authenticate(&mut gate, password)?;
        return match outcome {
            AuthOutcome::Granted => Ok(()),
            other => anyhow::bail!("{}", other.message()),
        };
    }

    loop {
        let password = prompt_line("Admin password: ")?.context("No password provided")?;
        match app.authenticate(&mut gate, &password)? {
            AuthOutcome::Granted => return Ok(()),
            locked @ AuthOutcome::LockedOut { .. } => anyhow::bail!("{}", locked.message()),
            other => eprintln!("{}", other.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppLockConfig;
    use tempfile::tempdir;

    const LEGACY_ADMIN123: &str =
        "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9";

    #[test]
    fn test_require_admin_with_flag() {
        let temp_dir = tempdir().unwrap();
        let config = AppLockConfig::with_password_hash(LEGACY_ADMIN123.to_string());
        let mut app = AppLock::from_config(temp_dir.path().join("app-lock.yaml"), config);

        let err = require_admin(&mut app, Some("wrong")).unwrap_err();
        assert!(err.to_string().contains("Invalid password"));
        assert!(require_admin(&mut app, Some("")).is_err());
        assert!(require_admin(&mut app, Some("admin123")).is_ok());
    }

    #[test]
    fn test_config_path_override() {
        let path = Path::new("/tmp/custom.yaml");
        assert_eq!(config_path(Some(path)).unwrap(), path);
    }
}
