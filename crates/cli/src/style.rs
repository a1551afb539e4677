//! Shared styling utilities for the CLI.

use console::Style;

use rebasekit_core::models::Disposition;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Yes/no verdict for inclusion checks.
pub fn verdict(included: bool) -> String {
    if included {
        Style::new().green().bold().apply_to("yes").to_string()
    } else {
        Style::new().red().bold().apply_to("no").to_string()
    }
}

/// Table cell for a disposition.
pub fn disposition_cell(disposition: Disposition) -> comfy_table::Cell {
    use comfy_table::{Cell, Color};
    match disposition {
        Disposition::Pick => Cell::new("pick").fg(Color::Green),
        Disposition::Drop => Cell::new("drop").fg(Color::Red),
        Disposition::Unset => Cell::new("-"),
    }
}
