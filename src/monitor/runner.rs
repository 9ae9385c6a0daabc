use anyhow::Result;
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{BlockRule, MonitorSettings};
use crate::monitor::enforcement::{BlockEnforcer, TickReport};
use crate::monitor::process::ProcessTable;
use crate::platform::Notifier;

/// Rule list shared between the console and the monitor task
///
/// Writers replace the whole list; the monitor takes one snapshot per tick.
#[derive(Clone, Default)]
pub struct SharedRules {
    inner: Arc<RwLock<Arc<[BlockRule]>>>,
}

impl SharedRules {
    pub fn new(rules: Vec<BlockRule>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(rules.into())),
        }
    }

    /// Current rules
    pub fn snapshot(&self) -> Arc<[BlockRule]> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap in a new rule list
    pub fn replace(&self, rules: Vec<BlockRule>) {
        let rules: Arc<[BlockRule]> = rules.into();
        match self.inner.write() {
            Ok(mut guard) => *guard = rules,
            Err(poisoned) => *poisoned.into_inner() = rules,
        }
    }
}

/// Background process monitor
pub struct AppMonitor {
    rules: SharedRules,
    notifier: Arc<dyn Notifier>,
    notifications: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AppMonitor {
    pub fn new(rules: SharedRules, notifier: Arc<dyn Notifier>, show_notifications: bool) -> Self {
        Self {
            rules,
            notifier,
            notifications: Arc::new(AtomicBool::new(show_notifications)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn notifier_name(&self) -> &'static str {
        self.notifier.name()
    }

    /// Turn block notifications on or off while running
    pub fn set_notifications(&self, enabled: bool) {
        self.notifications.store(enabled, Ordering::SeqCst);
    }

    /// Start the monitoring loop on the current tokio runtime
    pub fn start(&mut self, table: Box<dyn ProcessTable>, settings: &MonitorSettings) -> Result<()> {
        if self.is_running() {
            anyhow::bail!("Monitoring is already running");
        }
        // Each run gets its own flag so a stopped loop can never be revived
        if let Some(previous) = self.handle.take() {
            previous.abort();
        }
        self.running = Arc::new(AtomicBool::new(true));

        info!(
            "Starting process monitor (every {} seconds)",
            settings.poll_interval_secs
        );

        let rules = self.rules.clone();
        let notifier = self.notifier.clone();
        let notifications = self.notifications.clone();
        let running = self.running.clone();
        let poll_interval = Duration::from_secs(settings.poll_interval_secs.max(1));
        let error_backoff = Duration::from_secs(settings.error_backoff_secs);

        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut enforcer = Some(BlockEnforcer::new(table));

            loop {
                interval.tick().await;

                // Check if we should stop
                if !running.load(Ordering::SeqCst) {
                    info!("Process monitor stopped");
                    break;
                }

                let Some(mut current) = enforcer.take() else {
                    break;
                };
                let snapshot = rules.snapshot();
                let now = Local::now().time();
                let notifier = notifier.clone();
                let notifications = notifications.clone();

                // Enumeration, termination and notification helpers all block,
                // keep them off the runtime threads
                let joined = tokio::task::spawn_blocking(move || {
                    let result = current.tick(&snapshot, now);
                    if let Ok(report) = &result {
                        notify_blocked(report, notifier.as_ref(), &notifications);
                    }
                    (current, result)
                })
                .await;

                match joined {
                    Ok((returned, result)) => {
                        enforcer = Some(returned);
                        if let Err(e) = result {
                            error!("Error in monitoring: {:#}", e);
                            time::sleep(error_backoff).await;
                        }
                    }
                    Err(e) => {
                        error!("Monitor tick panicked: {}", e);
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Ask the loop to stop; it exits at the top of its next tick
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping process monitor");
        }
    }

    /// Stop and wait for the loop to finish
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Process monitor task ended abnormally: {}", e);
            }
        }
    }
}

fn notify_blocked(report: &TickReport, notifier: &dyn Notifier, enabled: &AtomicBool) {
    debug!(
        "Tick: scanned {}, skipped {}, terminated {}, refused {}, vanished {}",
        report.scanned,
        report.skipped,
        report.terminated.len(),
        report.refused.len(),
        report.vanished.len()
    );
    if report.terminated.is_empty() {
        return;
    }

    if !enabled.load(Ordering::SeqCst) {
        return;
    }

    for found in &report.terminated {
        let message = format!("Blocked application: {}", found.rule_name);
        if let Err(e) = notifier.notify("App Lock", &message) {
            warn!("Failed to show notification: {:#}", e);
        }
    }
}
