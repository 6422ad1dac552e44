pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{ConversionController, Currency, RateFetcher};
use crate::providers::exchangerate_api::ExchangeRateApiProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum AppCommand {
    Convert {
        amount: Option<String>,
        from: Option<String>,
        to: Option<String>,
    },
    Rates {
        base: Option<String>,
    },
    Currencies,
    Interactive,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xconv starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let fetcher: Arc<dyn RateFetcher> =
        Arc::new(ExchangeRateApiProvider::new(config.rates_base_url()));
    let mut settings = config.controller_settings();

    match command {
        AppCommand::Convert { amount, from, to } => {
            if let Some(amount) = amount {
                settings.amount_text = amount;
            }
            if let Some(from) = from {
                settings.source = Currency::from_code(&from);
            }
            if let Some(to) = to {
                settings.target = Currency::from_code(&to);
            }
            cli::convert::run(fetcher, settings).await
        }
        AppCommand::Rates { base } => {
            let base = base.map_or(settings.source, |code| Currency::from_code(&code));
            cli::rates::run(fetcher.as_ref(), &base).await
        }
        AppCommand::Currencies => {
            println!("{}", cli::currencies::render_table());
            Ok(())
        }
        AppCommand::Interactive => {
            cli::interactive::run(ConversionController::new(fetcher, settings)).await
        }
    }
}
