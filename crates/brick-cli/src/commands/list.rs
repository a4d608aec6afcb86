//! Show every known block and its copies (brick list)

use super::Session;
use anyhow::Result;
use brick_package::{InventoryRow, Version};
use colored::Colorize;

pub fn run(session: &Session) -> Result<()> {
    let ws = session.workspace()?;
    let rows = ws.registry.inventory();
    if rows.is_empty() {
        println!("No blocks found.");
        return Ok(());
    }
    print!("{}", render(&rows));
    Ok(())
}

fn cell(version: &Option<Version>) -> String {
    version
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Aligned table, one row per block.
fn render(rows: &[InventoryRow]) -> String {
    let width = rows
        .iter()
        .map(|r| r.title.len())
        .max()
        .unwrap_or(0)
        .max("Block".len());

    let header = format!(
        "{:<width$}  {:<10} {:<10} {:<10} {}",
        "Block",
        "Download",
        "Installed",
        "Available",
        "Pins",
        width = width
    );
    let mut out = format!("{}\n", header.bold());
    for row in rows {
        out.push_str(&format!(
            "{:<width$}  {:<10} {:<10} {:<10} {}\n",
            row.title,
            cell(&row.downloaded),
            cell(&row.installed),
            cell(&row.available),
            row.pins.join(" "),
            width = width
        ));
    }
    out
}
