//! `freerouter list`: show what the generated config routes.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use freerouter_core::OutputDocument;

use crate::config::ConfigPaths;
use crate::daemon::{self, Liveness};

use super::serve::service_url;

pub fn run(paths: &ConfigPaths) -> Result<()> {
    match daemon::liveness(&paths.pid_file()) {
        Liveness::Running(state) => println!(
            "● Service Running (PID: {}, {})",
            state.pid,
            service_url(&state, &paths.settings())
        ),
        _ => println!("○ Service Not Running (start with: freerouter start)"),
    }
    println!();

    let doc = OutputDocument::load(&paths.output).with_context(|| {
        format!(
            "Cannot read {} (run 'freerouter fetch' first)",
            paths.output.display()
        )
    })?;

    if doc.model_list.is_empty() {
        println!("No models configured.");
        return Ok(());
    }

    println!("{}", models_table(&doc));
    println!();
    println!("{}", total_line(&doc));
    Ok(())
}

/// One row per model, grouped by backend.
fn models_table(doc: &OutputDocument) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Provider").fg(Color::Cyan),
        Cell::new("Model").fg(Color::Cyan),
    ]);

    for (backend, models) in doc.by_backend() {
        let label = format!("{} ({})", backend, models.len());
        for (i, model) in models.into_iter().enumerate() {
            let provider = if i == 0 { label.as_str() } else { "" };
            table.add_row(vec![Cell::new(provider), Cell::new(model)]);
        }
    }
    table
}

fn total_line(doc: &OutputDocument) -> String {
    format!(
        "Total: {} models across {} providers",
        doc.model_list.len(),
        doc.by_backend().len()
    )
}
