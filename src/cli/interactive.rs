use super::{convert, ui};
use crate::core::{ConversionController, Currency};
use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "Type an amount, `from CODE`, `to CODE`, `swap`, `refresh` or `quit`.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Amount(String),
    From(String),
    To(String),
    Swap,
    Refresh,
    Help,
    Quit,
}

/// Interprets one input line. Anything that isn't a keyword is amount text.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut words = line.split_whitespace();
    let keyword = words.next().unwrap_or_default().to_lowercase();
    let argument = words.next();
    let command = match (keyword.as_str(), argument) {
        ("from", Some(code)) => Command::From(code.to_uppercase()),
        ("to", Some(code)) => Command::To(code.to_uppercase()),
        ("swap", None) => Command::Swap,
        ("refresh", None) => Command::Refresh,
        ("help" | "?", None) => Command::Help,
        ("quit" | "exit" | "q", None) => Command::Quit,
        _ => Command::Amount(line.to_string()),
    };
    Some(command)
}

/// Drives a controller from line-based input and writes each settled state to `out`.
///
/// Input ends on `quit` or EOF; on EOF a final refresh is awaited so piped input
/// always produces a result for the last edit.
pub async fn run_session<R, W>(controller: ConversionController, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut updates = controller.subscribe();
    let mut last_rendered = String::new();

    writeln!(out, "{}", ui::style_text(HELP, ui::StyleType::Subtle))?;
    controller.refresh_now().await;

    loop {
        let state = updates.borrow_and_update().clone();
        if !state.fetching {
            let rendered = convert::render(&state);
            if rendered != last_rendered {
                writeln!(out, "{rendered}\n")?;
                last_rendered = rendered;
            }
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("Input closed, running final refresh");
                    controller.refresh_now().await;
                    let rendered = convert::render(&controller.state());
                    if rendered != last_rendered {
                        writeln!(out, "{rendered}")?;
                    }
                    break;
                };
                match parse_command(&line) {
                    Some(Command::Amount(text)) => controller.set_amount_text(&text),
                    Some(Command::From(code)) => controller.set_source_currency(Currency::from_code(&code)),
                    Some(Command::To(code)) => controller.set_target_currency(Currency::from_code(&code)),
                    Some(Command::Swap) => controller.swap_currencies(),
                    Some(Command::Refresh) => controller.refresh_now().await,
                    Some(Command::Help) => writeln!(out, "{HELP}")?,
                    Some(Command::Quit) => break,
                    None => {}
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    out.flush()?;
    Ok(())
}

pub async fn run(controller: ConversionController) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_session(controller, stdin, &mut stdout).await
}
