pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use salesbot_core::config::{ConfigOverrides, LoadOptions, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "salesbot",
    about = "Notebook sales assistant CLI",
    long_about = "Chat with the notebook sales assistant, inspect stored sessions, apply migrations, and check configuration.",
    after_help = "Examples:\n  salesbot chat --session ana --language english\n  salesbot slots --session ana\n  salesbot doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a salesbot.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url for this invocation")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive conversation with the assistant")]
    Chat {
        #[arg(long, help = "Session id to resume; a new one is generated when omitted")]
        session: Option<String>,
        #[arg(long, help = "Reply language (name or code, e.g. english or en)")]
        language: Option<String>,
        #[arg(long, help = "Print tool results after they execute")]
        show_tool_output: bool,
    },
    #[command(about = "Print the stored slot record of a session")]
    Slots {
        #[arg(long)]
        session: String,
    },
    #[command(about = "Forget a session's slots and dialogue history")]
    Reset {
        #[arg(long)]
        session: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model backend credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        overrides: ConfigOverrides { database_url: cli.database_url, ..ConfigOverrides::default() },
    };

    let result = match cli.command {
        Command::Chat { session, language, show_tool_output } => commands::chat::run(
            options,
            commands::chat::ChatOptions { session, language, show_tool_output },
        ),
        Command::Slots { session } => commands::slots::run(options, &session),
        Command::Reset { session } => commands::reset::run(options, &session),
        Command::Migrate => commands::migrate::run(options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(options, json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Logs go to stderr so they never interleave with the
/// conversation or the JSON payload on stdout. Returns false if one was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.format {
        Compact => builder.compact().try_init().is_ok(),
        Pretty => builder.pretty().try_init().is_ok(),
        Json => builder.json().try_init().is_ok(),
    }
}
