use super::ui;
use crate::core::convert::INVALID_INPUT;
use crate::core::{ControllerSettings, ConversionController, ConversionState, RateFetcher};
use anyhow::{Result, anyhow};
use std::sync::Arc;

/// Renders the display strings of a conversion state.
pub fn render(state: &ConversionState) -> String {
    let converted_ok =
        state.last_error.is_none() && state.converted_amount != INVALID_INPUT;
    let converted = if converted_ok {
        ui::style_text(
            &format!("{} {}", state.converted_amount, state.target.code),
            ui::StyleType::Value,
        )
    } else {
        ui::style_text(&state.converted_amount, ui::StyleType::Error)
    };

    let mut output = format!(
        "{} {} {}\n{} {}\n{} {}",
        ui::style_text("Amount:", ui::StyleType::Label),
        state.amount_text,
        state.source.code,
        ui::style_text("Converted Amount:", ui::StyleType::Label),
        converted,
        ui::style_text("Exchange Rate:", ui::StyleType::Label),
        state.rate_description,
    );

    if let Some(as_of) = state.snapshot.as_ref().and_then(|s| s.as_of) {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(&format!("Rates as of {as_of}"), ui::StyleType::Subtle)
        ));
    }
    output
}

/// One-shot conversion: fetch once for the configured pair and print the result.
pub async fn run(fetcher: Arc<dyn RateFetcher>, settings: ControllerSettings) -> Result<()> {
    let controller = ConversionController::new(fetcher, settings);

    let spinner = ui::new_spinner("Fetching exchange rates...");
    controller.refresh_now().await;
    spinner.finish_and_clear();

    let state = controller.state();
    println!("{}", render(&state));

    match state.last_error {
        Some(err) => Err(anyhow!("{}: {}", state.converted_amount, err)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Currency, ExchangeRateSnapshot};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn state(converted: &str, description: &str) -> ConversionState {
        ConversionState {
            amount_text: "100".to_string(),
            source: Currency::from_code("USD"),
            target: Currency::from_code("EUR"),
            snapshot: None,
            converted_amount: converted.to_string(),
            rate_description: description.to_string(),
            fetching: false,
            last_error: None,
        }
    }

    #[test]
    fn test_render_successful_conversion() {
        let mut state = state("150.00", "1 USD to EUR: 1.5");
        let mut snapshot =
            ExchangeRateSnapshot::new("USD", HashMap::from([("EUR".to_string(), 1.5)]));
        snapshot.as_of = NaiveDate::from_ymd_opt(2025, 6, 30);
        state.snapshot = Some(snapshot);

        let output = console::strip_ansi_codes(&render(&state)).to_string();
        assert!(output.contains("Amount: 100 USD"));
        assert!(output.contains("Converted Amount: 150.00 EUR"));
        assert!(output.contains("Exchange Rate: 1 USD to EUR: 1.5"));
        assert!(output.contains("Rates as of 2025-06-30"));
    }

    #[test]
    fn test_render_invalid_input_has_no_currency_suffix() {
        let state = state("Invalid input", "1 USD to EUR: 1.5");
        let output = console::strip_ansi_codes(&render(&state)).to_string();
        assert!(output.contains("Converted Amount: Invalid input\n"));
        assert!(!output.contains("Rates as of"));
    }

    #[test]
    fn test_render_fetch_failure() {
        let mut state = state("Failed to fetch exchange rates", "Exchange rate: Not available");
        state.last_error = Some("HTTP error".to_string());
        let output = console::strip_ansi_codes(&render(&state)).to_string();
        assert!(output.contains("Converted Amount: Failed to fetch exchange rates\n"));
        assert!(output.contains("Exchange Rate: Exchange rate: Not available"));
    }
}
