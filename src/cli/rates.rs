use super::ui;
use crate::core::{Currency, ExchangeRateSnapshot, FetchError, RateFetcher, currency};
use anyhow::{Context, Result};
use comfy_table::Cell;

/// Table of the catalog currencies' rates against the snapshot's base.
pub fn render_table(snapshot: &ExchangeRateSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Per 1 {}", snapshot.base)),
    ]);

    for currency in currency::catalog() {
        table.add_row(vec![
            Cell::new(&currency.code),
            Cell::new(&currency.name),
            ui::format_optional_cell(snapshot.rate(&currency.code), |r| format!("{r:?}")),
        ]);
    }

    let mut output = format!(
        "Rates for: {}",
        ui::style_text(&snapshot.base, ui::StyleType::Title)
    );
    if let Some(as_of) = snapshot.as_of {
        output.push_str(&ui::style_text(&format!(" (as of {as_of})"), ui::StyleType::Subtle));
    }
    output.push_str("\n\n");
    output.push_str(&table.to_string());
    output
}

pub async fn run(fetcher: &dyn RateFetcher, base: &Currency) -> Result<()> {
    let spinner = ui::new_spinner(&format!("Fetching exchange rates for {base}..."));
    let result = fetcher.fetch_rates(&base.code).await;
    spinner.finish_and_clear();

    let snapshot = result.context(FetchError::USER_MESSAGE)?;
    println!("{}", render_table(&snapshot));
    Ok(())
}
