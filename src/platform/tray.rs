use std::io::IsTerminal;
use tracing::warn;

/// Where the console goes when it is hidden
///
/// The tray keeps the monitor running in the background while the console
/// refuses everything except a password-gated `show`.
pub trait Tray: Send {
    /// Short name used in status output
    fn name(&self) -> &'static str;

    /// Whether the console can be hidden at all
    fn can_hide(&self) -> bool;

    /// Text shown when the console is hidden
    fn hidden_banner(&self) -> &'static str;
}

/// Console tray: hiding detaches the prompt, `show` brings it back
pub struct ConsoleTray;

impl Tray for ConsoleTray {
    fn name(&self) -> &'static str {
        "console"
    }

    fn can_hide(&self) -> bool {
        true
    }

    fn hidden_banner(&self) -> &'static str {
        "App Lock is running in the background. Type 'show' to unlock."
    }
}

/// No tray: `close` quits instead of hiding
pub struct DisabledTray;

impl Tray for DisabledTray {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn can_hide(&self) -> bool {
        false
    }

    fn hidden_banner(&self) -> &'static str {
        ""
    }
}

/// Pick the tray implementation for this session
///
/// Hiding only makes sense when somebody can type `show` again, so the tray
/// needs an interactive terminal.
pub fn select_tray() -> Box<dyn Tray> {
    if std::io::stdin().is_terminal() {
        Box::new(ConsoleTray)
    } else {
        warn!("Tray not available (stdin is not a terminal), closing will exit");
        Box::new(DisabledTray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tray_capabilities() {
        assert!(ConsoleTray.can_hide());
        assert!(!ConsoleTray.hidden_banner().is_empty());
        assert!(!DisabledTray.can_hide());
    }
}
