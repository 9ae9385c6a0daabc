use anyhow::Result;
use clap::Parser;

mod app;
mod auth;
mod cli;
mod commands;
mod config;
mod console;
mod monitor;
mod platform;
mod schedule;

use cli::{Args, Commands, RuleCommands, SettingsCommands};
use commands::utils::{init_logging, print_elevation_message};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.config.as_deref();
    let password = args.password.as_deref();
    let command = args.command.unwrap_or(Commands::Run);

    if matches!(command, Commands::Run | Commands::Monitor | Commands::Kill { .. })
        && !platform::is_elevated()
    {
        print_elevation_message();
    }

    match command {
        Commands::Run => commands::session::run(config),
        Commands::Monitor => commands::monitor::run_headless(config),
        Commands::Check { at } => commands::monitor::check(config, at),
        Commands::Rules { command } => match command {
            RuleCommands::List => commands::rules::list(config),
            RuleCommands::Add { path, name, from, to } => {
                commands::rules::add(config, password, path, name, from, to)
            }
            RuleCommands::Remove { app } => commands::rules::remove(config, password, &app),
            RuleCommands::Enable { app } => {
                commands::rules::set_enabled(config, password, &app, true)
            }
            RuleCommands::Disable { app } => {
                commands::rules::set_enabled(config, password, &app, false)
            }
        },
        Commands::Settings { command } => match command {
            SettingsCommands::Show => commands::settings::show(config),
            SettingsCommands::Set { key, value } => {
                commands::settings::set(config, password, &key, &value)
            }
        },
        Commands::Password => commands::settings::change_password(config, password),
        Commands::Processes { filter } => commands::processes::list(filter.as_deref()),
        Commands::Kill { pid } => commands::processes::kill(config, password, pid),
        Commands::Export { file } => commands::transfer::export(config, password, &file),
        Commands::Import { file } => commands::transfer::import(config, password, &file),
    }
}
