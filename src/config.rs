use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::schedule::{ClockTime, TimeWindow};

/// File name used inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "app-lock.yaml";

/// Main application configuration, persisted as a flat YAML document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppLockConfig {
    /// Admin and UI settings
    pub settings: Settings,

    /// Process monitor tuning
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Blocked applications
    #[serde(default)]
    pub rules: Vec<BlockRule>,
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Argon2 PHC string (or a legacy SHA-256 hex digest)
    pub password_hash: String,

    /// Start monitoring as soon as the console is unlocked
    #[serde(default = "default_true")]
    pub auto_start_monitoring: bool,

    /// `close` hides the console instead of quitting
    #[serde(default = "default_true")]
    pub minimize_to_tray: bool,

    /// Raise a desktop notification for every blocked launch
    #[serde(default = "default_true")]
    pub show_notifications: bool,
}

/// Monitor loop timing
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Seconds between ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Extra wait after a tick where the process table could not be read
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2
}

fn default_error_backoff() -> u64 {
    5
}

/// A blocked application
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BlockRule {
    /// Full path to the executable; identifies the rule
    pub path: String,

    /// Display name
    pub name: String,

    /// Inactive rules are kept but never enforced
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Only block inside `[start_time, end_time)`
    #[serde(default)]
    pub time_restricted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<ClockTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<ClockTime>,
}

impl BlockRule {
    /// Rule that blocks the executable at all times
    pub fn always(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            enabled: true,
            time_restricted: false,
            start_time: None,
            end_time: None,
        }
    }

    /// Rule that blocks the executable inside a daily window
    pub fn scheduled(path: impl Into<String>, name: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            time_restricted: true,
            start_time: Some(window.start),
            end_time: Some(window.end),
            ..Self::always(path, name)
        }
    }

    /// Display name derived from an executable path (`C:\Games\game.exe` -> `game`)
    pub fn default_name(path: &str) -> String {
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let stem = match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file,
        };
        stem.to_string()
    }

    /// The blocking window, if the rule is time restricted
    pub fn window(&self) -> Option<TimeWindow> {
        if !self.time_restricted {
            return None;
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => None,
        }
    }

    /// Whether the rule should be enforced at the given local time
    ///
    /// A time-restricted rule with an incomplete window blocks all day.
    pub fn is_active_at(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.time_restricted {
            return true;
        }
        self.window().map(|w| w.contains(now)).unwrap_or(true)
    }

    /// Whether a running executable path refers to this rule's executable
    pub fn matches_path(&self, exe: &str) -> bool {
        normalize_path(&self.path) == normalize_path(exe)
    }

    /// Human readable schedule description
    pub fn schedule_label(&self) -> String {
        match self.window() {
            Some(window) => window.to_string(),
            None if self.time_restricted => "incomplete window".to_string(),
            None => "always".to_string(),
        }
    }
}

/// Canonical form used when comparing executable paths
///
/// Windows paths are case-insensitive and accept both separators.
pub fn normalize_path(path: &str) -> String {
    if cfg!(windows) {
        path.trim().replace('/', "\\").to_ascii_lowercase()
    } else {
        path.trim().to_string()
    }
}

impl AppLockConfig {
    /// Fresh configuration protected by the given password hash
    pub fn with_password_hash(password_hash: String) -> Self {
        Self {
            settings: Settings {
                password_hash,
                auto_start_monitoring: true,
                minimize_to_tray: true,
                show_notifications: true,
            },
            monitor: MonitorSettings::default(),
            rules: Vec::new(),
        }
    }

    /// Look up a rule by path or display name
    pub fn find_rule(&self, key: &str) -> Option<&BlockRule> {
        self.rules
            .iter()
            .find(|r| r.matches_path(key))
            .or_else(|| self.rules.iter().find(|r| r.name.eq_ignore_ascii_case(key)))
    }

    /// Insert a rule, replacing any existing rule for the same executable.
    /// Returns the replaced rule.
    pub fn upsert_rule(&mut self, rule: BlockRule) -> Option<BlockRule> {
        match self.rules.iter_mut().find(|r| r.matches_path(&rule.path)) {
            Some(existing) => Some(std::mem::replace(existing, rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }

    /// Remove a rule by path or display name
    pub fn remove_rule(&mut self, key: &str) -> Option<BlockRule> {
        let index = self
            .rules
            .iter()
            .position(|r| r.matches_path(key))
            .or_else(|| self.rules.iter().position(|r| r.name.eq_ignore_ascii_case(key)))?;
        Some(self.rules.remove(index))
    }
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "app-lock")
        .context("Could not determine a configuration directory for this user")?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load configuration from YAML file
pub fn load_config(path: &Path) -> Result<AppLockConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppLockConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

    validate_config(&config)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Save configuration to YAML file
pub fn save_config(path: &Path, config: &AppLockConfig) -> Result<()> {
    // Validate before saving
    validate_config(config)?;

    let content = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    crate::platform::common::atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &AppLockConfig) -> Result<()> {
    if config.settings.password_hash.trim().is_empty() {
        anyhow::bail!("Password hash cannot be empty");
    }

    if config.monitor.poll_interval_secs == 0 {
        anyhow::bail!("Poll interval must be at least one second");
    }

    let mut paths = HashSet::new();
    for rule in &config.rules {
        validate_rule(rule).with_context(|| format!("Invalid rule '{}'", rule.name))?;

        if !paths.insert(normalize_path(&rule.path)) {
            anyhow::bail!("Duplicate rule for executable: {}", rule.path);
        }
    }

    Ok(())
}

/// Validate a single block rule
pub fn validate_rule(rule: &BlockRule) -> Result<()> {
    if rule.path.trim().is_empty() {
        anyhow::bail!("Executable path cannot be empty");
    }

    if rule.name.trim().is_empty() {
        anyhow::bail!("Display name cannot be empty");
    }

    if rule.time_restricted {
        let (Some(start), Some(end)) = (rule.start_time, rule.end_time) else {
            anyhow::bail!("Time-restricted rule needs both a start and an end time");
        };
        if start == end {
            anyhow::bail!("Start and end time are both {}, the window would be empty", start);
        }
    }

    Ok(())
}

/// Write the configuration to an arbitrary file; `.json` selects JSON, anything else YAML
pub fn export_config(path: &Path, config: &AppLockConfig) -> Result<()> {
    let content = if is_json(path) {
        serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?
    } else {
        serde_yaml::to_string(config).context("Failed to serialize config to YAML")?
    };

    crate::platform::common::atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write export file: {}", path.display()))
}

/// Configuration read from an import file
#[derive(Debug, Clone)]
pub struct ImportedConfig {
    pub rules: Vec<BlockRule>,
    pub password_hash: Option<String>,
    pub settings: Option<Settings>,
    pub monitor: Option<MonitorSettings>,
}

impl ImportedConfig {
    /// Apply on top of an existing configuration; fields missing from the
    /// import keep their current values
    pub fn merge_into(self, current: &AppLockConfig) -> Result<AppLockConfig> {
        let mut merged = current.clone();
        merged.rules = self.rules;
        if let Some(settings) = self.settings {
            merged.settings = settings;
        }
        if let Some(hash) = self.password_hash {
            merged.settings.password_hash = hash;
        }
        if let Some(monitor) = self.monitor {
            merged.monitor = monitor;
        }

        validate_config(&merged).context("Imported configuration is invalid")?;
        Ok(merged)
    }
}

/// Import document formats
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Native(AppLockConfig),
    Legacy(LegacyConfig),
}

/// Flat document written by earlier releases
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    blocked_apps: BTreeMap<String, LegacyApp>,
    #[serde(default)]
    password_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyApp {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    time_restricted: bool,
    #[serde(default)]
    start_time: Option<ClockTime>,
    #[serde(default)]
    end_time: Option<ClockTime>,
    #[serde(default = "default_true")]
    blocked: bool,
}

/// Read an import file in YAML or JSON, native or legacy layout
pub fn read_import(path: &Path) -> Result<ImportedConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    parse_import(&content).with_context(|| format!("Unrecognised import file: {}", path.display()))
}

/// Parse import content; YAML is a superset of JSON so one parser covers both
pub fn parse_import(content: &str) -> Result<ImportedConfig> {
    let document: ImportDocument = serde_yaml::from_str(content)
        .context("Expected an app-lock configuration (settings/rules or blocked_apps)")?;

    let imported = match document {
        ImportDocument::Native(config) => ImportedConfig {
            rules: config.rules,
            password_hash: Some(config.settings.password_hash.clone()),
            settings: Some(config.settings),
            monitor: Some(config.monitor),
        },
        ImportDocument::Legacy(legacy) => ImportedConfig {
            rules: legacy
                .blocked_apps
                .into_iter()
                .filter_map(|(key, app)| {
                    // Older releases saved empty windows; drop them rather than the whole file
                    if app.time_restricted
                        && app.start_time.is_some()
                        && app.start_time == app.end_time
                    {
                        warn!("Skipping '{}': its time window is empty", app.name);
                        return None;
                    }
                    Some(BlockRule {
                        path: app.path.unwrap_or(key),
                        name: app.name,
                        enabled: app.blocked,
                        time_restricted: app.time_restricted,
                        start_time: app.start_time.filter(|_| app.time_restricted),
                        end_time: app.end_time.filter(|_| app.time_restricted),
                    })
                })
                .collect(),
            password_hash: legacy.password_hash,
            settings: None,
            monitor: None,
        },
    };

    for rule in &imported.rules {
        validate_rule(rule).with_context(|| format!("Invalid rule '{}'", rule.name))?;
    }

    Ok(imported)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
