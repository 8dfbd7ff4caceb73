// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--field key=value` parsing shared by enqueue and notify

use pw_core::Payload;
use serde_json::Value;

/// Split `key=value`; the value is JSON when it parses, a string otherwise
pub fn parse_field(s: &str) -> Result<(String, Value), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{s}`"))?;
    let key = &s[..pos];
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in `{s}`"));
    }
    let raw = &s[pos + 1..];
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Later fields overwrite earlier ones with the same key
pub fn into_payload(fields: Vec<(String, Value)>) -> Payload {
    fields.into_iter().collect()
}

#[cfg(test)]
#[path = "fields_tests.rs"]
mod tests;
