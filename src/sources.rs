use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

use crate::common::error::{Result, ScraperError};

/// Where the list of show short-names comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowSource {
    File(PathBuf),
    Url(String),
}

impl ShowSource {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            ShowSource::Url(value.to_string())
        } else {
            ShowSource::File(PathBuf::from(value))
        }
    }
}

/// Load show names, trimmed, blanks dropped, first occurrence kept.
#[instrument]
pub async fn load_show_names(source: &ShowSource, column: &str) -> Result<Vec<String>> {
    let content = match source {
        ShowSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            ScraperError::Config(format!("Failed to read show list '{}': {}", path.display(), e))
        })?,
        ShowSource::Url(url) => {
            let response = reqwest::get(url).await?.error_for_status()?;
            response.text().await?
        }
    };

    let names = parse_show_names(&content, column)?;
    info!("Loaded {} show names", names.len());
    Ok(names)
}

/// Accepts a JSON array of strings, a JSON array of row objects (read from
/// `column`), or plain text with one name per line.
pub fn parse_show_names(content: &str, column: &str) -> Result<Vec<String>> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    let raw: Vec<String> = if trimmed.starts_with('[') {
        let rows: Vec<Value> = serde_json::from_str(trimmed)?;
        rows.into_iter()
            .filter_map(|row| match row {
                Value::String(name) => Some(name),
                Value::Object(mut fields) => match fields.remove(column) {
                    Some(Value::String(name)) => Some(name),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => {
                        debug!("Row has no '{}' value", column);
                        None
                    }
                },
                _ => None,
            })
            .collect()
    } else {
        trimmed.lines().map(str::to_string).collect()
    };

    let mut seen = HashSet::new();
    Ok(raw
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .collect())
}
