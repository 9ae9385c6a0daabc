/// Interactive console
///
/// A password-gated prompt for managing rules while the monitor runs in the
/// background. Hiding the console keeps monitoring alive and locks every
/// command except `show`, which goes through the same login gate.
/// If input ends while hidden, monitoring carries on until the process is
/// interrupted.

pub mod parse;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

use crate::app::AppLock;
use crate::auth::{AuthGate, DEFAULT_PASSWORD};
use crate::commands::utils::{write_processes, write_rules, write_settings};
use crate::monitor::{AppMonitor, ProcessTable, TerminateOutcome};
use crate::platform::{is_elevated, Notifier, Tray};
use parse::{split_words, window_from, ConsoleCommand, ConsoleLine};

/// Creates process tables for the monitor and for `processes`/`kill`
pub type TableFactory = Box<dyn Fn() -> Box<dyn ProcessTable>>;

type Detached = Pin<Box<dyn Future<Output = ()>>>;

enum Flow {
    Continue,
    Quit,
}

pub struct ConsoleSession<R, W> {
    app: AppLock,
    gate: AuthGate,
    monitor: AppMonitor,
    tray: Box<dyn Tray>,
    new_table: TableFactory,
    input: Lines<R>,
    out: W,
    hidden: bool,
    detached: Option<Detached>,
}

impl<R, W> ConsoleSession<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        app: AppLock,
        notifier: Arc<dyn Notifier>,
        tray: Box<dyn Tray>,
        new_table: TableFactory,
        input: R,
        out: W,
    ) -> Self {
        let monitor = AppMonitor::new(
            app.shared_rules(),
            notifier,
            app.config().settings.show_notifications,
        );
        Self {
            app,
            gate: AuthGate::default(),
            monitor,
            tray,
            new_table,
            input: input.lines(),
            out,
            hidden: false,
            detached: None,
        }
    }

    /// Keep enforcing after input closes on a hidden console, until `until` resolves
    pub fn keep_monitoring_until(mut self, until: impl Future<Output = ()> + 'static) -> Self {
        self.detached = Some(Box::pin(until));
        self
    }

    /// Log in, then read commands until `exit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.out, "App Lock - enter the admin password to continue")?;
        if !self.login().await? {
            writeln!(self.out, "Goodbye.")?;
            return Ok(());
        }

        if self.app.config().settings.auto_start_monitoring {
            self.start_monitoring()?;
        }
        writeln!(self.out, "Type 'help' for a list of commands.")?;

        loop {
            let prompt = if self.hidden { "(hidden)> " } else { "app-lock> " };
            let Some(line) = self.read_line(prompt).await? else {
                break;
            };
            match self.handle_line(&line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => writeln!(self.out, "Error: {:#}", e)?,
            }
        }

        // Nothing quits a hidden console, so input simply ran out
        if self.hidden && self.monitor.is_running() {
            warn!("Console input closed while hidden, monitoring continues");
            writeln!(
                self.out,
                "Input closed while hidden; monitoring continues until App Lock is stopped."
            )?;
            if let Some(until) = self.detached.take() {
                until.await;
            }
        }

        self.monitor.shutdown().await;
        writeln!(self.out, "Goodbye.")?;
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        self.input
            .next_line()
            .await
            .context("Failed to read from the console")
    }

    /// Prompt until the gate grants access; `false` on end of input
    async fn login(&mut self) -> Result<bool> {
        loop {
            let Some(password) = self.read_line("Password: ").await? else {
                return Ok(false);
            };
            if self.check_password(&password)? {
                return Ok(true);
            }
        }
    }

    fn check_password(&mut self, password: &str) -> Result<bool> {
        let outcome = self.app.authenticate(&mut self.gate, password)?;
        writeln!(self.out, "{}", outcome.message())?;

        if outcome.is_granted() && password == DEFAULT_PASSWORD {
            writeln!(
                self.out,
                "⚠ You are using the default password, change it with 'passwd'."
            )?;
        }
        Ok(outcome.is_granted())
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let words = split_words(line)?;
        let Some(first) = words.first() else {
            return Ok(Flow::Continue);
        };

        if self.hidden {
            if first.eq_ignore_ascii_case("show") {
                self.show().await?;
            } else {
                writeln!(self.out, "{}", self.tray.hidden_banner())?;
            }
            return Ok(Flow::Continue);
        }

        match ConsoleLine::try_parse_from(words) {
            Ok(parsed) => self.execute(parsed.command).await,
            Err(e) => {
                // Covers `help` as well as usage errors
                write!(self.out, "{}", e.render())?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow> {
        match command {
            ConsoleCommand::List => {
                write_rules(&mut self.out, &self.app.config().rules, Local::now().time())?;
            }
            ConsoleCommand::Add { path, name, from, to } => {
                let window = window_from(from, to)?;
                let replaced = self.app.add_rule(&path, name, window, true)?;
                let rule = self
                    .app
                    .config()
                    .find_rule(path.trim())
                    .context("Added rule not found")?;
                let verb = if replaced.is_some() { "Updated" } else { "Blocked" };
                writeln!(self.out, "✓ {} {} ({})", verb, rule.name, rule.schedule_label())?;
            }
            ConsoleCommand::Remove { app } => {
                let removed = self.app.remove_rule(&app)?;
                writeln!(self.out, "✓ Removed {}", removed.name)?;
            }
            ConsoleCommand::Enable { app } => {
                let rule = self.app.set_rule_enabled(&app, true)?;
                writeln!(self.out, "✓ Enabled {}", rule.name)?;
            }
            ConsoleCommand::Disable { app } => {
                let rule = self.app.set_rule_enabled(&app, false)?;
                writeln!(self.out, "✓ Disabled {}", rule.name)?;
            }
            ConsoleCommand::Processes { filter } => {
                let processes = (self.new_table)().snapshot()?;
                write_processes(&mut self.out, &processes, filter.as_deref())?;
            }
            ConsoleCommand::Kill { pid } => self.kill(pid).await?,
            ConsoleCommand::Start => {
                if self.monitor.is_running() {
                    writeln!(self.out, "Monitoring is already running.")?;
                } else {
                    self.start_monitoring()?;
                }
            }
            ConsoleCommand::Stop => {
                if self.monitor.is_running() {
                    self.monitor.stop();
                    writeln!(self.out, "✓ Monitoring stopped")?;
                } else {
                    writeln!(self.out, "Monitoring is not running.")?;
                }
            }
            ConsoleCommand::Status => self.status()?,
            ConsoleCommand::Settings => {
                let default_password = self.app.uses_default_password();
                write_settings(&mut self.out, self.app.config(), default_password)?;
            }
            ConsoleCommand::Set { key, value } => {
                self.app.set_setting(&key, &value)?;
                self.monitor
                    .set_notifications(self.app.config().settings.show_notifications);
                writeln!(self.out, "✓ {} updated", key)?;
                if key.ends_with("_secs") && self.monitor.is_running() {
                    writeln!(self.out, "Restart monitoring ('stop', then 'start') to use the new timing.")?;
                }
            }
            ConsoleCommand::Passwd => self.change_password().await?,
            ConsoleCommand::Export { file } => {
                self.app.export(&file)?;
                writeln!(self.out, "✓ Exported configuration to {}", file.display())?;
            }
            ConsoleCommand::Import { file } => {
                let count = self.app.import(&file)?;
                self.monitor
                    .set_notifications(self.app.config().settings.show_notifications);
                writeln!(self.out, "✓ Imported {} rule(s) from {}", count, file.display())?;
            }
            ConsoleCommand::Hide => {
                if self.tray.can_hide() {
                    self.hide()?;
                } else {
                    writeln!(self.out, "Hiding is not available here, use 'exit' to quit.")?;
                }
            }
            ConsoleCommand::Show => {
                writeln!(self.out, "The console is already visible.")?;
            }
            ConsoleCommand::Close => {
                if self.app.config().settings.minimize_to_tray && self.tray.can_hide() {
                    self.hide()?;
                } else {
                    return Ok(Flow::Quit);
                }
            }
            ConsoleCommand::Exit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    fn start_monitoring(&mut self) -> Result<()> {
        let table = (self.new_table)();
        self.monitor.start(table, &self.app.config().monitor)?;
        writeln!(self.out, "✓ Monitoring started")?;
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        self.hidden = true;
        writeln!(self.out, "{}", self.tray.hidden_banner())?;
        Ok(())
    }

    async fn show(&mut self) -> Result<()> {
        let Some(password) = self.read_line("Password: ").await? else {
            return Ok(());
        };
        if self.check_password(&password)? {
            self.hidden = false;
            writeln!(self.out, "Welcome back.")?;
        }
        Ok(())
    }

    async fn kill(&mut self, pid: u32) -> Result<()> {
        if pid == std::process::id() {
            anyhow::bail!("Refusing to terminate App Lock itself");
        }

        let mut table = (self.new_table)();
        let processes = table.snapshot()?;
        let Some(process) = processes.iter().find(|p| p.pid == pid) else {
            anyhow::bail!("No process with pid {}", pid);
        };

        let question = format!("Terminate {} (pid {})? [y/N] ", process.display_name(), pid);
        let answer = self.read_line(&question).await?.unwrap_or_default();
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            writeln!(self.out, "Cancelled.")?;
            return Ok(());
        }

        match table.terminate(pid) {
            TerminateOutcome::Terminated => writeln!(self.out, "✓ Terminated process {}", pid)?,
            TerminateOutcome::Vanished => writeln!(self.out, "Process {} has already exited.", pid)?,
            TerminateOutcome::Refused => anyhow::bail!(
                "Access denied terminating process {}, run as administrator",
                pid
            ),
        }
        Ok(())
    }

    async fn change_password(&mut self) -> Result<()> {
        let current = self.read_line("Current password: ").await?.unwrap_or_default();
        let new_password = self.read_line("New password: ").await?.unwrap_or_default();
        let confirm = self.read_line("Confirm new password: ").await?.unwrap_or_default();

        self.app.change_password(&current, &new_password, &confirm)?;
        writeln!(self.out, "✓ Password changed")?;
        Ok(())
    }

    fn status(&mut self) -> Result<()> {
        let config = self.app.config();
        let now = Local::now().time();
        let blocking = config.rules.iter().filter(|r| r.is_active_at(now)).count();
        let notifications = if config.settings.show_notifications { "on" } else { "off" };

        writeln!(
            self.out,
            "Monitoring:    {}",
            if self.monitor.is_running() { "active" } else { "stopped" }
        )?;
        writeln!(
            self.out,
            "Rules:         {} ({} blocking now)",
            config.rules.len(),
            blocking
        )?;
        writeln!(
            self.out,
            "Notifications: {} ({})",
            notifications,
            self.monitor.notifier_name()
        )?;
        writeln!(self.out, "Tray:          {}", self.tray.name())?;
        writeln!(
            self.out,
            "Elevated:      {}",
            if is_elevated() { "yes" } else { "no" }
        )?;
        writeln!(self.out, "Config:        {}", self.app.config_path().display())?;
        Ok(())
    }
}
