use super::ui;
use crate::core::currency;
use comfy_table::Cell;

pub fn render_table() -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Country"),
        ui::header_cell("Flag"),
    ]);

    for currency in currency::catalog() {
        table.add_row(vec![
            Cell::new(currency.id),
            Cell::new(&currency.code),
            Cell::new(&currency.name),
            Cell::new(&currency.country),
            Cell::new(currency.flag.as_deref().unwrap_or("")),
        ]);
    }

    table.to_string()
}
