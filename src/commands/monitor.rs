use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;

use crate::monitor::{AppMonitor, BlockEnforcer, SysinfoProcessTable};
use crate::platform::select_notifier;
use crate::schedule::ClockTime;

use super::admin::open_app;

/// Enforce rules in the foreground until Ctrl+C
pub fn run_headless(config: Option<&Path>) -> Result<()> {
    let app = open_app(config)?;
    let current = app.config();

    println!("App Lock v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Monitoring {} rule(s) every {} seconds",
        current.rules.len(),
        current.monitor.poll_interval_secs
    );
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut monitor = AppMonitor::new(
            app.shared_rules(),
            select_notifier(),
            current.settings.show_notifications,
        );
        monitor.start(Box::new(SysinfoProcessTable::new()), &current.monitor)?;

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;

        monitor.shutdown().await;
        println!("✓ Monitoring stopped");
        Ok::<(), anyhow::Error>(())
    })
}

/// Show which running processes would be blocked, without terminating them
pub fn check(config: Option<&Path>, at: Option<ClockTime>) -> Result<()> {
    let app = open_app(config)?;
    let now = match at {
        Some(time) => time.as_naive(),
        None => Local::now().time(),
    };

    let rules = &app.config().rules;
    let active = rules.iter().filter(|r| r.is_active_at(now)).count();
    println!(
        "At {}: {} of {} rule(s) active",
        now.format("%H:%M"),
        active,
        rules.len()
    );

    let mut enforcer = BlockEnforcer::new(Box::new(SysinfoProcessTable::new()));
    let matches = enforcer.plan(rules, now)?;

    if matches.is_empty() {
        println!("✓ No running process would be blocked");
        return Ok(());
    }

    println!("Would block {} process(es):", matches.len());
    for found in &matches {
        println!(
            "  {:>8}  {:<30} {} ({})",
            found.pid, found.process_name, found.rule_name, found.exe
        );
    }
    Ok(())
}
