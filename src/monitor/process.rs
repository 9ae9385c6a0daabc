use anyhow::Result;
use std::path::PathBuf;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind};
use tracing::debug;

/// One entry of a process table snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Process name, if readable
    pub name: Option<String>,
    /// Executable path; `None` when access was denied or the process is a zombie
    pub exe: Option<PathBuf>,
    /// Resident memory in bytes
    pub memory: u64,
    pub status: String,
}

impl ProcessEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unknown>")
    }
}

/// Result of a terminate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// Signal delivered
    Terminated,
    /// Process exited before it could be signalled
    Vanished,
    /// The OS refused, usually for lack of privileges
    Refused,
}

/// Source of running processes and the means to stop them
pub trait ProcessTable: Send {
    /// Enumerate running processes
    fn snapshot(&mut self) -> Result<Vec<ProcessEntry>>;

    /// Ask a process to terminate
    fn terminate(&mut self, pid: u32) -> TerminateOutcome;
}

/// Process table backed by `sysinfo`
pub struct SysinfoProcessTable {
    system: System,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_exe(UpdateKind::OnlyIfNotSet)
            .with_memory()
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn snapshot(&mut self) -> Result<Vec<ProcessEntry>> {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());

        let entries = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: Some(process.name().to_string_lossy().into_owned())
                    .filter(|n| !n.is_empty()),
                exe: process.exe().map(|p| p.to_path_buf()),
                memory: process.memory(),
                status: process.status().to_string(),
            })
            .collect();

        Ok(entries)
    }

    fn terminate(&mut self, pid: u32) -> TerminateOutcome {
        let pid = Pid::from_u32(pid);

        // The process may have exited since the snapshot
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );

        let Some(process) = self.system.process(pid) else {
            return TerminateOutcome::Vanished;
        };

        // Windows has no SIGTERM, fall back to a hard kill
        let delivered = match process.kill_with(Signal::Term) {
            Some(delivered) => delivered,
            None => process.kill(),
        };

        if delivered {
            TerminateOutcome::Terminated
        } else {
            debug!("Signal to process {} was not delivered", pid);
            TerminateOutcome::Refused
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_current_process() {
        let mut table = SysinfoProcessTable::new();
        let entries = table.snapshot().unwrap();
        let me = std::process::id();
        assert!(entries.iter().any(|e| e.pid == me));
    }

    #[test]
    fn test_terminate_unknown_pid_reports_vanished() {
        let mut table = SysinfoProcessTable::new();
        // Far above any pid the kernel hands out by default
        assert_eq!(table.terminate(u32::MAX - 7), TerminateOutcome::Vanished);
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_and_block_live_processes() {
        use crate::config::BlockRule;
        use crate::monitor::enforcement::BlockEnforcer;
        use chrono::Local;
        use std::os::unix::process::ExitStatusExt;
        use std::process::Command;

        let mut table = SysinfoProcessTable::new();

        // Direct termination of a running child
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        let entries = table.snapshot().unwrap();
        let entry = entries.iter().find(|e| e.pid == pid).expect("child listed");
        let sleep_exe = entry.exe.clone().expect("child executable readable");

        assert_eq!(table.terminate(pid), TerminateOutcome::Terminated);
        assert_eq!(child.wait().unwrap().signal(), Some(libc::SIGTERM));

        // A private copy gives the blocked executable a path nothing else runs
        let temp_dir = tempfile::tempdir_in(env!("CARGO_MANIFEST_DIR")).unwrap();
        let copy = temp_dir.path().join("sleep");
        std::fs::copy(&sleep_exe, &copy).unwrap();
        // A concurrent fork elsewhere in the test binary can briefly hold the copy open
        let mut blocked = (0..20)
            .find_map(|_| match Command::new(&copy).arg("30").spawn() {
                Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) => {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    None
                }
                other => Some(other.unwrap()),
            })
            .expect("copied executable never became runnable");
        let blocked_pid = blocked.id();

        let entries = table.snapshot().unwrap();
        let blocked_exe = entries
            .iter()
            .find(|e| e.pid == blocked_pid)
            .and_then(|e| e.exe.clone())
            .expect("copied child listed");

        let rule = BlockRule::always(blocked_exe.to_string_lossy(), "sleep");
        let mut enforcer = BlockEnforcer::new(Box::new(SysinfoProcessTable::new()));
        let report = enforcer.tick(&[rule], Local::now().time()).unwrap();

        assert_eq!(report.terminated.len(), 1);
        assert_eq!(report.terminated[0].pid, blocked_pid);
        assert_eq!(blocked.wait().unwrap().signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn test_display_name_fallback() {
        let entry = ProcessEntry {
            pid: 1,
            name: None,
            exe: None,
            memory: 0,
            status: "Run".to_string(),
        };
        assert_eq!(entry.display_name(), "<unknown>");
    }
}
