use crate::types::Report;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, Table};

// Sizes above 2^53 bytes lose precision, which human-readable units hide anyway
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn render_table(report: &Report) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(vec!["Folder", "Total Size", "Files Listed", "Listed Size"]);

    for folder in &report.folders {
        let nested = folder.size.saturating_sub(folder.listed_bytes());
        table.add_row(vec![
            Cell::new(&folder.name),
            Cell::new(human_bytes::human_bytes(folder.size as f64)),
            Cell::new(folder.files.len()),
            Cell::new(human_bytes::human_bytes(folder.listed_bytes() as f64)).fg(if nested > 0 {
                Color::Yellow
            } else {
                Color::White
            }),
        ]);
    }

    table.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(human_bytes::human_bytes(report.total_size() as f64))
            .add_attribute(Attribute::Bold),
        Cell::new(report.folders.iter().map(|f| f.files.len()).sum::<usize>())
            .add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);

    table
}

pub fn print_report(report: &Report, skipped: usize) {
    println!(
        "{}",
        format!(
            "=== Folder Report: {} ===",
            report.generated_at.format("%Y-%m-%d %H:%M")
        )
        .cyan()
    );

    if report.folders.is_empty() {
        println!("{}", "No folders found.".yellow());
    } else {
        println!("{}", render_table(report));
    }

    if skipped > 0 {
        println!(
            "{} {skipped} entries could not be read and were skipped (see log).",
            "WARNING:".yellow()
        );
    }
}
