use anyhow::Result;
use std::process::Command;
use std::sync::Arc;
use tracing::{info, warn};

/// Desktop notification capability
pub trait Notifier: Send + Sync {
    /// Short name used in status output
    fn name(&self) -> &'static str;

    /// Show a notification
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Native notifications through the desktop's command-line helper
pub struct DesktopNotifier;

impl DesktopNotifier {
    /// Whether the platform helper is installed
    pub fn is_available() -> bool {
        #[cfg(target_os = "linux")]
        {
            let has_display = std::env::var_os("DISPLAY").is_some()
                || std::env::var_os("WAYLAND_DISPLAY").is_some();
            has_display && try_command("notify-send", &["--version"]).is_ok()
        }

        #[cfg(target_os = "macos")]
        {
            true
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            false
        }
    }
}

impl Notifier for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn notify(&self, title: &str, message: &str) -> Result<()> {
        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                message.replace('"', "'"),
                title.replace('"', "'")
            );
            try_command("osascript", &["-e", &script])
        }

        #[cfg(not(target_os = "macos"))]
        {
            try_command("notify-send", &[title, message, "--icon=dialog-warning"])
        }
    }
}

/// Fallback that only writes the notification to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, title: &str, message: &str) -> Result<()> {
        info!("Notification: {} - {}", title, message);
        Ok(())
    }
}

/// Pick the best notifier available on this machine
pub fn select_notifier() -> Arc<dyn Notifier> {
    if DesktopNotifier::is_available() {
        Arc::new(DesktopNotifier)
    } else {
        warn!("Desktop notifications not available, notifications will only be logged");
        Arc::new(LogNotifier)
    }
}

/// Try to execute a command, returning Ok if successful
fn try_command(cmd: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(cmd).args(args).output()?;

    if output.status.success() {
        Ok(())
    } else {
        anyhow::bail!("Command failed: {} {:?}", cmd, args)
    }
}
