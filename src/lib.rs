pub mod cli;
pub mod config;
pub mod core;
pub mod log;
pub mod providers;
pub mod store;
pub mod trading;
pub mod updater;

use anyhow::Result;
use tracing::debug;

use crate::trading::App;

/// Commands the library can execute, decoupled from the clap surface.
#[derive(Debug)]
pub enum AppCommand {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    Buy {
        username: String,
        currency: String,
        amount: f64,
    },
    Sell {
        username: String,
        currency: String,
        amount: f64,
    },
    Portfolio {
        username: String,
        currency: Option<String>,
    },
    Rate {
        from: String,
        to: String,
    },
    Rates {
        currency: Option<String>,
        top: Option<usize>,
    },
    Update {
        source: Option<String>,
    },
    Cache,
    Currencies,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::new(config)?;

    match command {
        AppCommand::Register { username, password } => {
            let user = app.register_user(&username, &password)?;
            println!("Registered user '{}' (id {}).", user.username, user.user_id);
        }
        AppCommand::Login { username, password } => {
            let user = app.authenticate(&username, &password)?;
            println!("Welcome back, {}.", user.username);
        }
        AppCommand::Buy {
            username,
            currency,
            amount,
        } => {
            let receipt = app.buy(&username, &currency, amount)?;
            cli::render::print_trade(&receipt, &app.registry);
        }
        AppCommand::Sell {
            username,
            currency,
            amount,
        } => {
            let receipt = app.sell(&username, &currency, amount)?;
            cli::render::print_trade(&receipt, &app.registry);
        }
        AppCommand::Portfolio { username, currency } => {
            let valuation = app.portfolio_view(&username, currency.as_deref())?;
            cli::render::print_portfolio(&valuation, &app.registry);
        }
        AppCommand::Rate { from, to } => {
            let quote = app.exchange_rate_view(&from, &to)?;
            cli::render::print_rate_quote(&quote);
        }
        AppCommand::Rates { currency, top } => {
            let listing = app.cached_rates(currency.as_deref(), top)?;
            cli::render::print_rates(&listing);
        }
        AppCommand::Update { source } => {
            let pb = cli::ui::new_spinner("Fetching rates...");
            let report = app.update_rates(source.as_deref()).await?;
            pb.finish_and_clear();
            cli::render::print_update_report(&report);
        }
        AppCommand::Cache => {
            cli::render::print_cache_info(&app.cache_info());
        }
        AppCommand::Currencies => {
            cli::render::print_currencies(&app.registry);
        }
    }

    Ok(())
}
