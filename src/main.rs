use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use xconv::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert (defaults to the configured amount)
        #[arg(allow_negative_numbers = true)]
        amount: Option<String>,
        /// Currency to convert from
        #[arg(short, long)]
        from: Option<String>,
        /// Currency to convert to
        #[arg(short, long)]
        to: Option<String>,
    },
    /// Show rates of the built-in currencies for a base currency
    Rates {
        /// Base currency (defaults to the configured source currency)
        #[arg(short, long)]
        base: Option<String>,
    },
    /// List the built-in currencies
    Currencies,
    /// Convert interactively, reading amounts and commands from stdin
    Interactive,
}

impl From<Commands> for xconv::AppCommand {
    fn from(cmd: Commands) -> xconv::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => {
                xconv::AppCommand::Convert { amount, from, to }
            }
            Commands::Rates { base } => xconv::AppCommand::Rates { base },
            Commands::Currencies => xconv::AppCommand::Currencies,
            Commands::Interactive => xconv::AppCommand::Interactive,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => xconv::cli::setup::setup_at_path(path),
            None => xconv::cli::setup::setup(),
        },
        Some(cmd) => xconv::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
