use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use valutahub::core::error::CoreError;
use valutahub::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for valutahub::AppCommand {
    fn from(cmd: Commands) -> valutahub::AppCommand {
        match cmd {
            Commands::Register { username, password } => {
                valutahub::AppCommand::Register { username, password }
            }
            Commands::Login { username, password } => {
                valutahub::AppCommand::Login { username, password }
            }
            Commands::Buy {
                username,
                currency,
                amount,
            } => valutahub::AppCommand::Buy {
                username,
                currency,
                amount,
            },
            Commands::Sell {
                username,
                currency,
                amount,
            } => valutahub::AppCommand::Sell {
                username,
                currency,
                amount,
            },
            Commands::Portfolio { username, currency } => {
                valutahub::AppCommand::Portfolio { username, currency }
            }
            Commands::Rate { from, to } => valutahub::AppCommand::Rate { from, to },
            Commands::Rates { currency, top } => valutahub::AppCommand::Rates { currency, top },
            Commands::Update { source } => valutahub::AppCommand::Update { source },
            Commands::Cache => valutahub::AppCommand::Cache,
            Commands::Currencies => valutahub::AppCommand::Currencies,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Register a new user and an empty portfolio
    Register {
        username: String,
        /// Minimum four characters
        password: String,
    },
    /// Verify a username and password
    Login { username: String, password: String },
    /// Add an amount of a currency to a wallet
    Buy {
        username: String,
        currency: String,
        amount: f64,
    },
    /// Remove an amount of a currency from a wallet
    Sell {
        username: String,
        currency: String,
        amount: f64,
    },
    /// Display wallet balances valued in an anchor currency
    Portfolio {
        username: String,
        /// Valuation currency; defaults to the configured anchor
        #[arg(long = "currency")]
        currency: Option<String>,
    },
    /// Resolve an exchange rate from the cache
    Rate { from: String, to: String },
    /// List cached exchange rates
    Rates {
        /// Only pairs with this currency on either side
        #[arg(long)]
        currency: Option<String>,
        /// Only the N highest anchor-quoted rates
        #[arg(long)]
        top: Option<usize>,
    },
    /// Refresh the rate cache from the configured providers
    Update {
        /// Restrict the refresh to one provider, e.g. "CoinGecko"
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Show rate cache freshness
    Cache,
    /// List supported currencies
    Currencies,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => valutahub::cli::setup::setup(),
        Some(cmd) => valutahub::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        if let Some(hint) = guidance(e) {
            eprintln!("{hint}");
        }
        tracing::error!(error = %e, "Application failed");
    }
    result
}

/// Actionable follow-up for errors the user can fix themselves.
fn guidance(error: &anyhow::Error) -> Option<String> {
    match error.downcast_ref::<CoreError>()? {
        CoreError::RateNotFound { .. } => {
            Some("Hint: run `valutahub update` to refresh the rate cache.".to_string())
        }
        CoreError::UnknownCurrency(_) | CoreError::InvalidCurrencyCode(_) => Some(format!(
            "Hint: supported currencies are {}.",
            valutahub::core::CurrencyRegistry::builtin().codes().join(", ")
        )),
        CoreError::UserNotFound(_) => {
            Some("Hint: run `valutahub register <username> <password>` first.".to_string())
        }
        _ => None,
    }
}
