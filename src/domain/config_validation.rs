//! Configuration validation.
//!
//! Checks the `[search]` section before any price data is touched.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::domain::date_range::{MAX_INTERVAL_DAYS, MIN_INTERVAL_DAYS};
use crate::domain::error::PortoptError;
use crate::ports::config_port::ConfigPort;

pub fn validate_search_config(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    validate_window(config)?;
    validate_iterations(config)?;
    validate_max_step(config)?;
    validate_extra_effort(config)?;
    validate_tickers(config)?;
    Ok(())
}

/// Checks the sampling window keys only: dates and interval.
pub fn validate_window(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    validate_dates(config)?;
    validate_interval(config)
}

/// Splits a comma-separated ticker list, trimming and upper-casing entries.
pub fn parse_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `[search] tickers`, upper-cased.
pub fn configured_tickers(config: &dyn ConfigPort) -> Vec<String> {
    config
        .get_list("search", "tickers")
        .into_iter()
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

pub fn parse_date(
    section: &str,
    field: &str,
    value: Option<&str>,
) -> Result<NaiveDate, PortoptError> {
    match value {
        None => Err(PortoptError::ConfigMissing {
            section: section.to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            PortoptError::ConfigInvalid {
                section: section.to_string(),
                key: field.to_string(),
                reason: format!("invalid {field} format, expected YYYY-MM-DD"),
            }
        }),
    }
}

fn invalid(key: &str, reason: &str) -> PortoptError {
    PortoptError::ConfigInvalid {
        section: "search".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    let start_str = config.get_string("search", "start_date");
    let end_str = config.get_string("search", "end_date");

    let start_date = parse_date("search", "start_date", start_str.as_deref())?;
    let end_date = parse_date("search", "end_date", end_str.as_deref())?;

    if start_date >= end_date {
        return Err(invalid("start_date", "start_date must be before end_date"));
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    let value = config.get_int("search", "interval_days", MIN_INTERVAL_DAYS);
    if value < 1 {
        return Err(invalid("interval_days", "interval_days must be positive"));
    }
    if value > MAX_INTERVAL_DAYS {
        return Err(invalid(
            "interval_days",
            &format!("interval_days must be at most {MAX_INTERVAL_DAYS}"),
        ));
    }
    Ok(())
}

fn validate_iterations(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    if config.get_int("search", "iterations", 1000) < 1 {
        return Err(invalid("iterations", "iterations must be at least 1"));
    }
    Ok(())
}

fn validate_max_step(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    let value = config.get_double("search", "max_step", 0.5);
    if !(value > 0.0 && value.is_finite()) {
        return Err(invalid("max_step", "max_step must be positive"));
    }
    Ok(())
}

fn validate_extra_effort(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    if config.get_int("search", "extra_effort", 20) < 0 {
        return Err(invalid("extra_effort", "extra_effort must be non-negative"));
    }
    Ok(())
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), PortoptError> {
    let tickers = configured_tickers(config);
    if tickers.is_empty() {
        return Err(PortoptError::ConfigMissing {
            section: "search".to_string(),
            key: "tickers".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for t in &tickers {
        if !seen.insert(t.as_str()) {
            return Err(invalid("tickers", &format!("duplicate ticker {t}")));
        }
    }
    Ok(())
}
