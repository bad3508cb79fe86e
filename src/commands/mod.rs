pub mod auth;
pub mod backtest;
pub mod environments;
pub mod results;
pub mod simulations;
pub mod stocks;
pub mod strategies;

use crate::models::parse_date;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};

pub(crate) fn parse_date_arg(raw: &str) -> Result<NaiveDate> {
    parse_date(raw).ok_or_else(|| anyhow!("{} is not a date in YYYY-MM-DD format", raw))
}

/// Splits `key=value` command-line parameters.
pub(crate) fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("parameter {} must look like key=value", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("parameter {} has an empty key", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Uses `provided` when given, otherwise reads one line from stdin.
pub(crate) fn read_password(provided: Option<String>) -> Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub(crate) fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_parsing() {
        assert_eq!(
            parse_key_value("period = 14").unwrap(),
            ("period".to_string(), "14".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("period").is_err());
        assert!(parse_key_value("=14").is_err());
    }

    #[test]
    fn date_arguments() {
        assert_eq!(
            parse_date_arg("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date_arg("03/01/2024").is_err());
        assert!(parse_date_arg("2024-01-01junk").is_err());
        assert_eq!(format_date(None), "-");
    }
}
