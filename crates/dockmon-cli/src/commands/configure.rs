use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Context;

use crate::client::ApiClient;
use crate::config::CliConfig;

const DEFAULT_HOST: &str = "http://localhost:7777";

pub fn configure(path: &Path) -> anyhow::Result<()> {
    let existing = CliConfig::load(path).unwrap_or_default();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let config = read_config(&mut input, &mut output, &existing)?;

    ApiClient::connect(&config)?;
    config.save(path)?;
    println!("✓ Configuration saved to {}", path.display());
    Ok(())
}

/// Prompt for each field. Host and username keep their stored values when
/// left blank; the password is always asked for.
fn read_config(
    input: &mut impl BufRead,
    output: &mut impl Write,
    existing: &CliConfig,
) -> anyhow::Result<CliConfig> {
    writeln!(output, "Enter dockmon configuration")?;
    let host_default: &str = if existing.host.is_empty() {
        DEFAULT_HOST
    } else {
        &existing.host
    };
    let config = CliConfig {
        host: prompt(input, output, "Host", host_default)?,
        username: prompt(input, output, "Username", &existing.username)?,
        password: prompt(input, output, "Password", "")?,
    };
    anyhow::ensure!(config.is_complete(), "host, username and password are all required");
    Ok(config)
}

fn prompt(
    input: &mut impl BufRead,
    output: &mut impl Write,
    key: &str,
    default: &str,
) -> anyhow::Result<String> {
    if default.is_empty() {
        write!(output, "{key}: ")?;
    } else {
        write!(output, "{key} ({default}): ")?;
    }
    output.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .with_context(|| format!("unable to read the value for '{key}'"))?;
    let value = line.trim();
    Ok(if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    })
}
