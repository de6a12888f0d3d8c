//! Configuration inspection: load a manager config file and render its
//! connection info table.

use std::fs;

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table, presets};
use console::style;
use courier_types::config::ManagerConfig;

pub fn show_config(path: &str, json_output: bool) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let config: ManagerConfig =
        toml::from_str(&raw).with_context(|| format!("failed to parse {path}"))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["url".to_string(), config.url.clone()]);
    table.add_row(vec![
        "dispatch_to".to_string(),
        config.dispatch_to.clone().unwrap_or_else(|| "<unset>".to_string()),
    ]);
    table.add_row(vec![
        "consume_on".to_string(),
        config.consume_on.clone().unwrap_or_else(|| "<unset>".to_string()),
    ]);
    table.add_row(vec!["durable".to_string(), config.durable.to_string()]);
    table.add_row(vec!["timeout_ms".to_string(), config.timeout_ms.to_string()]);
    table.add_row(vec![
        "throw_errors".to_string(),
        config.throw_errors.to_string(),
    ]);

    println!();
    println!(
        "  {} {}",
        style("Connection manager:").bold(),
        style(&config.name).cyan()
    );
    println!();
    println!("{table}");
    Ok(())
}
