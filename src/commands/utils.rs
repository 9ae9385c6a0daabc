use chrono::NaiveTime;
use std::io::{self, Write};

use crate::config::{AppLockConfig, BlockRule};
use crate::monitor::ProcessEntry;

/// Initialize logging
///
/// Logs go to stderr so they never interleave with command output.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Print elevation message based on OS
pub fn print_elevation_message() {
    #[cfg(unix)]
    eprintln!("Warning: not running as root, some processes cannot be terminated.");

    #[cfg(windows)]
    eprintln!("Warning: not running as Administrator, some processes cannot be terminated.");
}

/// Format a byte count for display
pub fn format_memory(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else {
        format!("{:.1} MB", mb)
    }
}

/// Print the rule table
pub fn write_rules(out: &mut impl Write, rules: &[BlockRule], now: NaiveTime) -> io::Result<()> {
    if rules.is_empty() {
        writeln!(out, "No blocked applications.")?;
        return Ok(());
    }

    writeln!(out, "Blocked applications ({}):", rules.len())?;
    for (i, rule) in rules.iter().enumerate() {
        let state = if !rule.enabled {
            "disabled"
        } else if rule.is_active_at(now) {
            "blocking"
        } else {
            "idle"
        };
        writeln!(
            out,
            "  {:>2}. {:<20} {:<9} {:<15} {}",
            i + 1,
            rule.name,
            state,
            rule.schedule_label(),
            rule.path
        )?;
    }
    Ok(())
}

/// Print settings
pub fn write_settings(out: &mut impl Write, config: &AppLockConfig, default_password: bool) -> io::Result<()> {
    let settings = &config.settings;
    writeln!(out, "Settings:")?;
    writeln!(out, "  auto_start_monitoring = {}", settings.auto_start_monitoring)?;
    writeln!(out, "  minimize_to_tray      = {}", settings.minimize_to_tray)?;
    writeln!(out, "  show_notifications    = {}", settings.show_notifications)?;
    writeln!(out, "  poll_interval_secs    = {}", config.monitor.poll_interval_secs)?;
    writeln!(out, "  error_backoff_secs    = {}", config.monitor.error_backoff_secs)?;

    if default_password {
        writeln!(out)?;
        writeln!(out, "⚠ The admin password is still the default, change it with 'passwd'.")?;
    }
    Ok(())
}

/// Print running processes, optionally filtered by a case-insensitive name fragment
pub fn write_processes(out: &mut impl Write, processes: &[ProcessEntry], filter: Option<&str>) -> io::Result<()> {
    let filter = filter.map(|f| f.to_lowercase());
    let mut shown: Vec<&ProcessEntry> = processes
        .iter()
        .filter(|p| match &filter {
            Some(f) => p.display_name().to_lowercase().contains(f),
            None => true,
        })
        .collect();
    shown.sort_by(|a, b| {
        a.display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase())
            .then(a.pid.cmp(&b.pid))
    });

    writeln!(out, "{:>8}  {:<30} {:>10}  {:<10} {}", "PID", "NAME", "MEMORY", "STATUS", "PATH")?;
    for p in &shown {
        let exe = p
            .exe
            .as_ref()
            .map(|e| e.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:>8}  {:<30} {:>10}  {:<10} {}",
            p.pid,
            p.display_name(),
            format_memory(p.memory),
            p.status,
            exe
        )?;
    }
    writeln!(out, "{} process(es)", shown.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TimeWindow;
    use std::path::PathBuf;

    fn text(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(0), "0.0 MB");
        assert_eq!(format_memory(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_memory(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_write_rules_states() {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let night = TimeWindow::new("22:00".parse().unwrap(), "06:00".parse().unwrap());
        let mut off = BlockRule::always("/opt/chat", "chat");
        off.enabled = false;
        let rules = vec![
            BlockRule::always("/opt/game", "game"),
            BlockRule::scheduled("/opt/tv", "tv", night),
            off,
        ];

        let output = text(|out| write_rules(out, &rules, noon));
        assert!(output.contains("Blocked applications (3)"));
        assert!(output.contains("blocking"));
        assert!(output.contains("22:00 - 06:00"));
        assert!(output.contains("idle"));
        assert!(output.contains("disabled"));
    }

    #[test]
    fn test_write_rules_empty() {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(text(|out| write_rules(out, &[], noon)), "No blocked applications.\n");
    }

    #[test]
    fn test_write_processes_filters_by_name() {
        let processes = vec![
            ProcessEntry {
                pid: 2,
                name: Some("Chrome.exe".to_string()),
                exe: Some(PathBuf::from(r"C:\Chrome\chrome.exe")),
                memory: 1024 * 1024,
                status: "Run".to_string(),
            },
            ProcessEntry {
                pid: 3,
                name: Some("notepad.exe".to_string()),
                exe: None,
                memory: 0,
                status: "Run".to_string(),
            },
        ];

        let output = text(|out| write_processes(out, &processes, Some("chrome")));
        assert!(output.contains("Chrome.exe"));
        assert!(!output.contains("notepad"));
        assert!(output.contains("1 process(es)"));
    }

    #[test]
    fn test_write_settings_flags_default_password() {
        let config = AppLockConfig::with_password_hash("x".to_string());
        assert!(text(|out| write_settings(out, &config, true)).contains("still the default"));
        assert!(!text(|out| write_settings(out, &config, false)).contains("still the default"));
    }
}
