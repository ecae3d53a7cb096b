pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadbridge",
    about = "Leadbridge operator CLI",
    long_about = "Check backend readiness, inspect effective configuration, and find the Odoo database the configured user can log in to.",
    after_help = "Examples:\n  leadbridge doctor --json\n  leadbridge config\n  leadbridge probe --database crm --database crm_prod"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Odoo authentication, and language model key presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Try candidate database names with the configured credentials")]
    Probe {
        #[arg(
            long = "database",
            value_name = "NAME",
            help = "Candidate database name (repeatable); defaults to the configured one plus common names"
        )]
        databases: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::CommandResult::text(commands::config::run(), 0),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Probe { databases } => commands::probe::run(databases),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
