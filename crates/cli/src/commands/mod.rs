pub mod classify;
pub mod resolve;
pub mod route;

use anyhow::Context;
use serde::Serialize;

use crate::OutputFormat;

/// Parse a JSON argument given inline or as `@path`.
pub fn json_arg(raw: &str) -> anyhow::Result<serde_json::Value> {
    if let Some(path) = raw.strip_prefix('@') {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        return serde_json::from_str(&content).with_context(|| format!("invalid JSON in {path}"));
    }
    serde_json::from_str(raw).context("invalid JSON argument")
}

/// Print `value` as JSON, or with `text` in text mode.
pub fn emit<T: Serialize>(
    format: &OutputFormat,
    value: &T,
    text: impl FnOnce(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}
