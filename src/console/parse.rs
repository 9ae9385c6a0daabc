use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::schedule::{ClockTime, TimeWindow};

/// One line typed at the console prompt
#[derive(Parser, Debug)]
#[command(name = "app-lock", no_binary_name = true, disable_version_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: ConsoleCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Show blocked applications
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
    Remove { app: String },
    /// Mark a blocked application active
    Enable { app: String },
    /// Mark a blocked application inactive
    Disable { app: String },
    /// Show running processes
    Processes {
        /// Only show processes whose name contains this text
        filter: Option<String>,
    },
    /// Terminate a process by pid
    Kill { pid: u32 },
    /// Start monitoring
    Start,
    /// Stop monitoring
    Stop,
    /// Show monitoring status
    Status,
    /// Show settings
    Settings,
    /// Change a setting
    Set { key: String, value: String },
    /// Change the admin password
    Passwd,
    /// Export the configuration (.json or .yaml)
    Export { file: PathBuf },
    /// Import a configuration file
    Import { file: PathBuf },
    /// Keep monitoring in the background and lock the console
    Hide,
    /// Unlock a hidden console
    Show,
    /// Hide if minimize-to-tray is enabled, otherwise exit
    Close,
    /// Stop monitoring and quit
    #[command(alias = "quit")]
    Exit,
}

/// Build a window from optional `--from`/`--to` values
pub fn window_from(from: Option<ClockTime>, to: Option<ClockTime>) -> Result<Option<TimeWindow>> {
    match (from, to) {
        (Some(start), Some(end)) => Ok(Some(TimeWindow::new(start, end))),
        (None, None) => Ok(None),
        _ => anyhow::bail!("Both --from and --to are needed for a time restriction"),
    }
}

/// Split a console line into words
///
/// Double quotes group words containing spaces. Backslashes are kept as
/// typed so Windows paths need no escaping.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        anyhow::bail!("Unterminated quote");
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> std::result::Result<ConsoleCommand, clap::Error> {
        ConsoleLine::try_parse_from(split_words(line).unwrap()).map(|l| l.command)
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("list").unwrap(), vec!["list"]);
        assert_eq!(split_words("  kill   42 ").unwrap(), vec!["kill", "42"]);
        assert!(split_words("").unwrap().is_empty());
    }

    #[test]
    fn test_split_keeps_windows_paths() {
        assert_eq!(
            split_words(r#"add "C:\Program Files\Game\game.exe" --name Game"#).unwrap(),
            vec!["add", r"C:\Program Files\Game\game.exe", "--name", "Game"]
        );
        assert_eq!(
            split_words(r"add C:\Games\game.exe").unwrap(),
            vec!["add", r"C:\Games\game.exe"]
        );
    }

    #[test]
    fn test_split_empty_quotes_and_unterminated() {
        assert_eq!(split_words(r#"add """#).unwrap(), vec!["add", ""]);
        assert!(split_words(r#"add "C:\Games"#).is_err());
    }

    #[test]
    fn test_parse_add_with_window() {
        let command = parse(r"add C:\Games\game.exe --from 22:00 --to 06:00").unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Add {
                path: r"C:\Games\game.exe".to_string(),
                name: None,
                from: Some("22:00".parse().unwrap()),
                to: Some("06:00".parse().unwrap()),
            }
        );
    }

    #[test]
    fn test_parse_add_needs_both_times() {
        assert!(parse(r"add C:\Games\game.exe --from 22:00").is_err());
        assert!(parse(r"add C:\Games\game.exe --from 25:00 --to 06:00").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("kill 42").unwrap(), ConsoleCommand::Kill { pid: 42 });
        assert_eq!(parse("quit").unwrap(), ConsoleCommand::Exit);
        assert_eq!(
            parse("processes chrome").unwrap(),
            ConsoleCommand::Processes { filter: Some("chrome".to_string()) }
        );
        assert!(parse("launch rockets").is_err());
    }

    #[test]
    fn test_window_from() {
        assert!(window_from(None, None).unwrap().is_none());
        assert!(window_from(Some("09:00".parse().unwrap()), None).is_err());
        let window = window_from(Some("09:00".parse().unwrap()), Some("17:00".parse().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(window.to_string(), "09:00 - 17:00");
    }
}
