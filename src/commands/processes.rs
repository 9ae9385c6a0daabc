use anyhow::Result;
use std::path::Path;

use crate::monitor::{ProcessTable, SysinfoProcessTable, TerminateOutcome};

use super::admin::{open_app, require_admin};
use super::utils::write_processes;

/// List running processes
pub fn list(filter: Option<&str>) -> Result<()> {
    let processes = SysinfoProcessTable::new().snapshot()?;
    write_processes(&mut std::io::stdout(), &processes, filter)?;
    Ok(())
}

/// Terminate a process by pid
pub fn kill(config: Option<&Path>, password: Option<&str>, pid: u32) -> Result<()> {
    if pid == std::process::id() {
        anyhow::bail!("Refusing to terminate App Lock itself");
    }

    let mut app = open_app(config)?;
    require_admin(&mut app, password)?;

    let mut table = SysinfoProcessTable::new();
    match table.terminate(pid) {
        TerminateOutcome::Terminated => println!("✓ Terminated process {}", pid),
        TerminateOutcome::Vanished => anyhow::bail!("No running process with pid {}", pid),
        TerminateOutcome::Refused => anyhow::bail!(
            "Access denied terminating process {}, run as administrator",
            pid
        ),
    }
    Ok(())
}
