use std::path::Path;

use chrono::{DateTime, Utc};

use dockmon_state::ServiceStatus;

use crate::client::ApiClient;
use crate::config::CliConfig;

const HEADERS: [&str; 5] = ["Name", "Status", "Should Restart", "Restarts", "Age"];

pub fn get_services(path: &Path) -> anyhow::Result<()> {
    let client = ApiClient::connect(&CliConfig::load_complete(path)?)?;
    let statuses = client.get_statuses()?;
    print!("{}", render_table(&statuses, Utc::now()));
    Ok(())
}

pub fn get_service(path: &Path, name: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!name.is_empty(), "no service name provided");
    let client = ApiClient::connect(&CliConfig::load_complete(path)?)?;
    let status = client.get_status(name)?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn service_row(status: &ServiceStatus, now: DateTime<Utc>) -> [String; 5] {
    [
        status.service_name.clone(),
        if status.is_healthy { "healthy" } else { "unhealthy" }.to_string(),
        if status.should_restart { "Yes" } else { "No" }.to_string(),
        status.restarts.to_string(),
        format_age(now - status.created_at),
    ]
}

fn render_table(statuses: &[ServiceStatus], now: DateTime<Utc>) -> String {
    let rows: Vec<[String; 5]> = statuses.iter().map(|s| service_row(s, now)).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_line(&HEADERS);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_line(&cells);
    }
    out
}

fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const YEAR: i64 = 365 * DAY;

    match secs {
        s if s < MINUTE => format!("{s} seconds"),
        s if s < HOUR => format!("{} minutes", s / MINUTE),
        s if s < DAY => format!("{} hours", s / HOUR),
        s if s > YEAR => format!("{} years", s / YEAR),
        s => format!("{} days", s / DAY),
    }
}
