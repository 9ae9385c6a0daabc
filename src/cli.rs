use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::schedule::ClockTime;

/// App Lock
///
/// Blocks chosen applications by terminating their processes, always or
/// inside a daily time window. Management is protected by an admin password.
#[derive(Parser, Debug)]
#[command(name = "app-lock")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Admin password for commands that change configuration or kill processes
    /// (prompted on stdin when omitted)
    #[arg(short, long, global = true, env = "APP_LOCK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive console (the default)
    Run,
    /// Enforce rules in the foreground until Ctrl+C
    Monitor,
    /// Show which running processes would be blocked, without terminating them
    Check {
        /// Evaluate time windows at this time instead of now (HH:MM)
        #[arg(long)]
        at: Option<ClockTime>,
    },
    /// Manage blocked applications
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Change the admin password
    Password,
    /// List running processes
    Processes {
        /// Only show processes whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Terminate a process by pid
    Kill {
        pid: u32,
    },
    /// Export the configuration (.json or .yaml)
    Export {
        file: PathBuf,
    },
    /// Import a configuration file, replacing the rule list
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// List blocked applications
    List,
    /// Block an application
    Add {
        /// Path to the executable
        path: String,

        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Only block from this time (HH:MM)
        #[arg(long, requires = "to")]
        from: Option<ClockTime>,

        /// Only block until this time (HH:MM)
        #[arg(long, requires = "from")]
        to: Option<ClockTime>,
    },
    /// Stop blocking an application (path or name)
    Remove {
        app: String,
    },
    /// Mark a blocked application active
    Enable {
        app: String,
    },
    /// Mark a blocked application inactive
    Disable {
        app: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current settings
    Show,
    /// Change a setting
    Set {
        key: String,
        value: String,
    },
}
