//! Console output helpers shared by the commands.

use std::io::{self, Write};

use dialoguer::console::style;

const HEADER_WIDTH: usize = 60;

/// Draws a boxed header with the given title.
pub fn print_header(title: &str) {
    let _ = print_header_to(&mut io::stdout(), title);
}

pub fn print_header_to<W: Write>(w: &mut W, title: &str) -> io::Result<()> {
    let border = "─".repeat(HEADER_WIDTH);
    writeln!(w, "┌{}┐", border)?;
    writeln!(w, "│ {:<width$} │", title, width = HEADER_WIDTH - 2)?;
    writeln!(w, "└{}┘", border)
}

pub fn print_success(message: &str) {
    let _ = print_success_to(&mut io::stdout(), message);
}

pub fn print_success_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(w, "{} {}", style("✓").green().bold(), style(message).green())
}

pub fn print_error(message: &str) {
    let _ = print_error_to(&mut io::stderr(), message);
}

pub fn print_error_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(w, "{} {}", style("✗").red().bold(), style(message).red())
}

/// Indented `label: value` line.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<8} {}", format!("{label}:"), value);
}
