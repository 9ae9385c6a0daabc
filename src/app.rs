use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::auth::{AdminAuth, AuthGate, AuthOutcome, DEFAULT_PASSWORD};
use crate::config::{self, AppLockConfig, BlockRule};
use crate::monitor::SharedRules;
use crate::schedule::TimeWindow;

/// Application state: the loaded configuration, where it lives, and the
/// rule list published to the monitor
///
/// Every change is written to disk before it takes effect, so a failed save
/// leaves the running configuration untouched.
pub struct AppLock {
    config_path: PathBuf,
    config: AppLockConfig,
    rules: SharedRules,
}

/// Settings that can be changed with `set`
pub const SETTING_KEYS: &[&str] = &[
    "auto_start_monitoring",
    "minimize_to_tray",
    "show_notifications",
    "poll_interval_secs",
    "error_backoff_secs",
];

impl AppLock {
    /// Load the configuration, creating a default one in memory if the file
    /// does not exist yet
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            config::load_config(config_path)?
        } else {
            info!(
                "No configuration at {}, using defaults",
                config_path.display()
            );
            Self::default_config()?
        };

        Ok(Self::from_config(config_path.to_path_buf(), config))
    }

    /// Like [`AppLock::open`], but a broken file falls back to defaults and
    /// the error is handed back for display
    pub fn open_or_default(config_path: &Path) -> Result<(Self, Option<anyhow::Error>)> {
        match Self::open(config_path) {
            Ok(app) => Ok((app, None)),
            Err(e) => {
                warn!("Failed to load configuration, using defaults: {:#}", e);
                let app = Self::from_config(config_path.to_path_buf(), Self::default_config()?);
                Ok((app, Some(e)))
            }
        }
    }

    pub fn from_config(config_path: PathBuf, config: AppLockConfig) -> Self {
        let rules = SharedRules::new(config.rules.clone());
        Self {
            config_path,
            config,
            rules,
        }
    }

    fn default_config() -> Result<AppLockConfig> {
        warn!("Using the default password; change it with 'app-lock password'");
        Ok(AppLockConfig::with_password_hash(AdminAuth::hash_password(
            DEFAULT_PASSWORD,
        )?))
    }

    pub fn config(&self) -> &AppLockConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Rule list handle for the monitor
    pub fn shared_rules(&self) -> SharedRules {
        self.rules.clone()
    }

    /// Persist a modified copy, then make it current
    fn commit(&mut self, updated: AppLockConfig) -> Result<()> {
        config::save_config(&self.config_path, &updated)?;
        self.rules.replace(updated.rules.clone());
        self.config = updated;
        Ok(())
    }

    /// Check a password through the gate
    ///
    /// A legacy SHA-256 hash is upgraded to Argon2 after a successful login.
    pub fn authenticate(&mut self, gate: &mut AuthGate, password: &str) -> Result<AuthOutcome> {
        let outcome = gate.submit(password, &self.config.settings.password_hash)?;

        if outcome.is_granted() {
            if password == DEFAULT_PASSWORD {
                warn!("Logged in with the default password, please change it");
            }

            if AdminAuth::is_legacy_hash(&self.config.settings.password_hash) {
                let mut updated = self.config.clone();
                updated.settings.password_hash = AdminAuth::hash_password(password)?;
                match self.commit(updated) {
                    Ok(()) => info!("Upgraded stored password hash to Argon2"),
                    Err(e) => warn!("Failed to upgrade stored password hash: {:#}", e),
                }
            }
        }

        Ok(outcome)
    }

    /// Whether the stored hash still matches the shipped default credential
    pub fn uses_default_password(&self) -> bool {
        AdminAuth::verify_password(DEFAULT_PASSWORD, &self.config.settings.password_hash)
            .unwrap_or(false)
    }

    /// Add or replace a rule; returns the rule it replaced
    pub fn add_rule(
        &mut self,
        path: &str,
        name: Option<String>,
        window: Option<TimeWindow>,
        require_exists: bool,
    ) -> Result<Option<BlockRule>> {
        let path = path.trim();
        if path.is_empty() {
            anyhow::bail!("Please provide an application path");
        }
        if require_exists && !Path::new(path).exists() {
            anyhow::bail!("Application path does not exist: {}", path);
        }

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| BlockRule::default_name(path));

        let rule = match window {
            Some(window) => BlockRule::scheduled(path, name, window),
            None => BlockRule::always(path, name),
        };
        config::validate_rule(&rule)?;

        let mut updated = self.config.clone();
        let replaced = updated.upsert_rule(rule);
        self.commit(updated)?;
        Ok(replaced)
    }

    /// Remove a rule by path or display name
    pub fn remove_rule(&mut self, key: &str) -> Result<BlockRule> {
        let mut updated = self.config.clone();
        let removed = updated
            .remove_rule(key)
            .with_context(|| format!("No blocked application matches '{}'", key))?;
        self.commit(updated)?;
        Ok(removed)
    }

    /// Mark a rule active or inactive
    pub fn set_rule_enabled(&mut self, key: &str, enabled: bool) -> Result<BlockRule> {
        let mut updated = self.config.clone();
        let path = updated
            .find_rule(key)
            .map(|r| r.path.clone())
            .with_context(|| format!("No blocked application matches '{}'", key))?;

        let rule = updated
            .rules
            .iter_mut()
            .find(|r| r.path == path)
            .context("Rule disappeared while updating")?;
        rule.enabled = enabled;
        let result = rule.clone();

        self.commit(updated)?;
        Ok(result)
    }

    /// Change the admin password
    pub fn change_password(&mut self, current: &str, new_password: &str, confirm: &str) -> Result<()> {
        if !AdminAuth::verify_password(current, &self.config.settings.password_hash)? {
            anyhow::bail!("Current password is incorrect");
        }
        AdminAuth::validate_new_password(new_password, confirm)?;

        let mut updated = self.config.clone();
        updated.settings.password_hash = AdminAuth::hash_password(new_password)?;
        self.commit(updated)?;

        info!("Admin password changed");
        Ok(())
    }

    /// Change one setting by key
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.config.clone();
        match key {
            "auto_start_monitoring" => updated.settings.auto_start_monitoring = parse_bool(value)?,
            "minimize_to_tray" => updated.settings.minimize_to_tray = parse_bool(value)?,
            "show_notifications" => updated.settings.show_notifications = parse_bool(value)?,
            "poll_interval_secs" => updated.monitor.poll_interval_secs = parse_secs(value)?,
            "error_backoff_secs" => updated.monitor.error_backoff_secs = parse_secs(value)?,
            _ => anyhow::bail!(
                "Unknown setting '{}', expected one of: {}",
                key,
                SETTING_KEYS.join(", ")
            ),
        }
        self.commit(updated)
    }

    /// Export the configuration to a file
    pub fn export(&self, path: &Path) -> Result<()> {
        config::export_config(path, &self.config)?;
        info!("Configuration exported to {}", path.display());
        Ok(())
    }

    /// Import a configuration file, replacing the rule list; returns the
    /// number of imported rules
    pub fn import(&mut self, path: &Path) -> Result<usize> {
        let imported = config::read_import(path)?;
        let updated = imported.merge_into(&self.config)?;
        let count = updated.rules.len();
        self.commit(updated)?;
        info!("Configuration imported from {}", path.display());
        Ok(count)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => anyhow::bail!("Expected true or false, got '{}'", other),
    }
}

fn parse_secs(value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Expected a number of seconds, got '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LEGACY_ADMIN123: &str =
        "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9";

    fn legacy_app(dir: &Path) -> AppLock {
        let config = AppLockConfig::with_password_hash(LEGACY_ADMIN123.to_string());
        AppLock::from_config(dir.join("app-lock.yaml"), config)
    }

    #[test]
    fn test_open_missing_file_uses_default_password() {
        let temp_dir = tempdir().unwrap();
        let app = AppLock::open(&temp_dir.path().join("app-lock.yaml")).unwrap();
        assert!(app.uses_default_password());
        assert!(app.config().rules.is_empty());
    }

    #[test]
    fn test_open_or_default_reports_broken_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("app-lock.yaml");
        std::fs::write(&path, "settings: [broken").unwrap();

        let (app, error) = AppLock::open_or_default(&path).unwrap();
        assert!(error.is_some());
        assert!(app.uses_default_password());
    }

    #[test]
    fn test_add_rule_persists_and_publishes() {
        let temp_dir = tempdir().unwrap();
        let exe = temp_dir.path().join("game.exe");
        std::fs::write(&exe, b"").unwrap();

        let mut app = legacy_app(temp_dir.path());
        let shared = app.shared_rules();

        let window = TimeWindow::new("22:00".parse().unwrap(), "06:00".parse().unwrap());
        let replaced = app
            .add_rule(exe.to_str().unwrap(), None, Some(window), true)
            .unwrap();
        assert!(replaced.is_none());

        assert_eq!(shared.snapshot().len(), 1);
        assert_eq!(shared.snapshot()[0].name, "game");

        let reloaded = config::load_config(app.config_path()).unwrap();
        assert_eq!(reloaded.rules.len(), 1);
        assert_eq!(reloaded.rules[0].window(), Some(window));
    }

    #[test]
    fn test_add_rule_requires_existing_path() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());
        let missing = temp_dir.path().join("missing.exe");

        assert!(app.add_rule(missing.to_str().unwrap(), None, None, true).is_err());
        assert!(app.add_rule(missing.to_str().unwrap(), None, None, false).is_ok());
    }

    #[test]
    fn test_failed_save_keeps_current_config() {
        let temp_dir = tempdir().unwrap();
        // A directory where the config file should be makes every save fail
        let blocker = temp_dir.path().join("app-lock.yaml");
        std::fs::create_dir_all(blocker.join("app-lock.tmp")).unwrap();

        let config = AppLockConfig::with_password_hash(LEGACY_ADMIN123.to_string());
        let mut app = AppLock::from_config(blocker.join("app-lock.yaml"), config);

        assert!(app.add_rule("/opt/game", None, None, false).is_err());
        assert!(app.config().rules.is_empty());
        assert!(app.shared_rules().snapshot().is_empty());
    }

    #[test]
    fn test_remove_and_toggle_rules() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());
        app.add_rule("/opt/game", Some("Game".to_string()), None, false).unwrap();

        let disabled = app.set_rule_enabled("game", false).unwrap();
        assert!(!disabled.enabled);
        assert!(!app.shared_rules().snapshot()[0].enabled);

        let removed = app.remove_rule("/opt/game").unwrap();
        assert_eq!(removed.name, "Game");
        assert!(app.remove_rule("/opt/game").is_err());
    }

    #[test]
    fn test_authenticate_upgrades_legacy_hash() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());
        let mut gate = AuthGate::default();

        let outcome = app.authenticate(&mut gate, "admin123").unwrap();
        assert!(outcome.is_granted());
        assert!(app.config().settings.password_hash.starts_with("$argon2"));

        let saved = config::load_config(app.config_path()).unwrap();
        assert!(AdminAuth::verify_password("admin123", &saved.settings.password_hash).unwrap());
    }

    #[test]
    fn test_change_password() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());

        assert!(app.change_password("wrong", "secret99", "secret99").is_err());
        assert!(app.change_password("admin123", "secret99", "secret98").is_err());
        assert!(app.change_password("admin123", "abc", "abc").is_err());

        app.change_password("admin123", "secret99", "secret99").unwrap();
        assert!(!app.uses_default_password());
        assert!(AdminAuth::verify_password("secret99", &app.config().settings.password_hash).unwrap());
    }

    #[test]
    fn test_set_setting() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());

        app.set_setting("show_notifications", "off").unwrap();
        app.set_setting("poll_interval_secs", "5").unwrap();
        assert!(!app.config().settings.show_notifications);
        assert_eq!(app.config().monitor.poll_interval_secs, 5);

        assert!(app.set_setting("poll_interval_secs", "0").is_err());
        assert!(app.set_setting("poll_interval_secs", "soon").is_err());
        assert!(app.set_setting("colour", "blue").is_err());
        assert_eq!(app.config().monitor.poll_interval_secs, 5);
    }

    #[test]
    fn test_export_then_import() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());
        app.add_rule("/opt/game", None, None, false).unwrap();
        app.add_rule("/opt/chat", None, None, false).unwrap();

        let export_path = temp_dir.path().join("backup.json");
        app.export(&export_path).unwrap();

        app.remove_rule("game").unwrap();
        assert_eq!(app.config().rules.len(), 1);

        let count = app.import(&export_path).unwrap();
        assert_eq!(count, 2);
        assert_eq!(app.shared_rules().snapshot().len(), 2);
    }

    #[test]
    fn test_invalid_import_keeps_rules() {
        let temp_dir = tempdir().unwrap();
        let mut app = legacy_app(temp_dir.path());
        app.add_rule("/opt/game", None, None, false).unwrap();

        let bad = temp_dir.path().join("bad.json");
        std::fs::write(&bad, "{\"something\": 1}").unwrap();

        assert!(app.import(&bad).is_err());
        assert_eq!(app.config().rules.len(), 1);
    }
}
