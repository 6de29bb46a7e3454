// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Polling options given as duration strings

use crate::error::{EnvironmentError, Result};
use serde_json::Value;
use std::time::Duration;

/// Parse a duration such as `"500ms"`, `"30s"`, `"5m"` or `"1h30m"`.
///
/// Every number needs a unit (`ns`, `us`, `ms`, `s`, `m`, `h`); fractions are
/// allowed (`"1.5h"`). A bare `"0"` is zero.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let input = s.trim();
    let invalid = || {
        EnvironmentError::ConfigurationError(format!(
            "invalid duration '{}', expected e.g. 500ms, 30s, 5m, 1h30m",
            s
        ))
    };

    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };

        total_nanos += value * scale;
        rest = tail;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Interval and timeout overrides for one wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitOptions {
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl WaitOptions {
    /// Parse `{interval: "1s", timeout: "5m"}`; absent or empty strings keep
    /// the defaults.
    pub fn parse(options: &Value) -> Result<Self> {
        let Some(fields) = options.as_object() else {
            return Err(EnvironmentError::ConfigurationError(format!(
                r#"wait options must be an object of the form {{interval:"1s",timeout:"5m"}}, got: {}"#,
                options
            )));
        };

        let field = |key: &str| -> Result<Option<Duration>> {
            match fields.get(key).and_then(Value::as_str) {
                Some(s) if !s.is_empty() => parse_duration(s).map(Some),
                _ => Ok(None),
            }
        };

        Ok(Self {
            interval: field("interval")?,
            timeout: field("timeout")?,
        })
    }
}
