use anyhow::Result;
use std::path::Path;
use tokio::io::BufReader;

use crate::app::AppLock;
use crate::console::ConsoleSession;
use crate::monitor::{ProcessTable, SysinfoProcessTable};
use crate::platform::{select_notifier, select_tray};

use super::admin::config_path;

/// Run the interactive console
pub fn run(config: Option<&Path>) -> Result<()> {
    let path = config_path(config)?;
    let (app, load_error) = AppLock::open_or_default(&path)?;
    if let Some(e) = load_error {
        eprintln!("⚠ Failed to load configuration: {:#}", e);
        eprintln!("  Continuing with defaults; saving will overwrite {}", path.display());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut session = ConsoleSession::new(
            app,
            select_notifier(),
            select_tray(),
            Box::new(|| Box::new(SysinfoProcessTable::new()) as Box<dyn ProcessTable>),
            BufReader::new(tokio::io::stdin()),
            std::io::stdout(),
        )
        .keep_monitoring_until(async {
            let _ = tokio::signal::ctrl_c().await;
        });
        session.run().await
    })
}
