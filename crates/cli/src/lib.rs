pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "switchboard",
    about = "Switchboard operator CLI",
    long_about = "Operate Switchboard migrations, config inspection, readiness checks, and correspondent registration.",
    after_help = "Examples:\n  switchboard doctor --json\n  switchboard config\n  switchboard add-correspondent --phone +15551234567 --name Ada --email ada@example.com"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Register a phone number allowed to call or text the service")]
    AddCorrespondent {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::AddCorrespondent { phone, name, email } => {
            commands::correspondent::run(&phone, &name, &email)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
