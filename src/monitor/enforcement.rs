use anyhow::{Context, Result};
use chrono::NaiveTime;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::{normalize_path, BlockRule};
use crate::monitor::process::{ProcessEntry, ProcessTable, TerminateOutcome};

/// A running process that an active rule says must go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMatch {
    pub pid: u32,
    pub process_name: String,
    pub exe: String,
    pub rule_name: String,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Processes inspected
    pub scanned: usize,
    /// Processes skipped because their executable could not be read
    pub skipped: usize,
    pub terminated: Vec<BlockMatch>,
    pub refused: Vec<BlockMatch>,
    pub vanished: Vec<BlockMatch>,
}

/// Find the processes that active rules require to be terminated
///
/// Processes without a readable executable path are ignored, as is the
/// process with `self_pid`.
pub fn find_matches(
    rules: &[BlockRule],
    processes: &[ProcessEntry],
    now: NaiveTime,
    self_pid: Option<u32>,
) -> Vec<BlockMatch> {
    let active: HashMap<String, &BlockRule> = rules
        .iter()
        .filter(|rule| rule.is_active_at(now))
        .map(|rule| (normalize_path(&rule.path), rule))
        .collect();

    if active.is_empty() {
        return Vec::new();
    }

    processes
        .iter()
        .filter(|process| Some(process.pid) != self_pid)
        .filter_map(|process| {
            let exe = process.exe.as_ref()?.to_string_lossy();
            let rule = active.get(&normalize_path(&exe))?;
            Some(BlockMatch {
                pid: process.pid,
                process_name: process.display_name().to_string(),
                exe: exe.into_owned(),
                rule_name: rule.name.clone(),
            })
        })
        .collect()
}

/// Runs ticks against a process table
pub struct BlockEnforcer {
    table: Box<dyn ProcessTable>,
    self_pid: Option<u32>,
}

impl BlockEnforcer {
    pub fn new(table: Box<dyn ProcessTable>) -> Self {
        Self {
            table,
            self_pid: Some(std::process::id()),
        }
    }

    /// Enforcer that does not exempt any pid
    #[cfg(test)]
    pub fn without_self_exemption(table: Box<dyn ProcessTable>) -> Self {
        Self { table, self_pid: None }
    }

    /// Matches for the current process table without terminating anything
    pub fn plan(&mut self, rules: &[BlockRule], now: NaiveTime) -> Result<Vec<BlockMatch>> {
        let processes = self.table.snapshot().context("Failed to enumerate processes")?;
        Ok(find_matches(rules, &processes, now, self.self_pid))
    }

    /// Enumerate, match and terminate
    ///
    /// Only a failure to enumerate at all is an error. Per-process problems
    /// are recorded in the report and the tick carries on.
    pub fn tick(&mut self, rules: &[BlockRule], now: NaiveTime) -> Result<TickReport> {
        let processes = self.table.snapshot().context("Failed to enumerate processes")?;

        let mut report = TickReport {
            scanned: processes.len(),
            skipped: processes.iter().filter(|p| p.exe.is_none()).count(),
            ..TickReport::default()
        };

        for found in find_matches(rules, &processes, now, self.self_pid) {
            match self.table.terminate(found.pid) {
                TerminateOutcome::Terminated => {
                    info!("Blocked: {} (pid {})", found.rule_name, found.pid);
                    report.terminated.push(found);
                }
                TerminateOutcome::Vanished => {
                    debug!("Process {} exited before it could be blocked", found.pid);
                    report.vanished.push(found);
                }
                TerminateOutcome::Refused => {
                    warn!(
                        "Access denied terminating {} (pid {}), run as administrator",
                        found.rule_name, found.pid
                    );
                    report.refused.push(found);
                }
            }
        }

        Ok(report)
    }
}
