//! Environment configuration validation and loading for the demo binary.
//!
//! Collects every malformed variable into one aggregate error rather than
//! bailing on the first one found.

use anyhow::{Context, Result};
use std::env;

/// Variables that should be validated if present (none are required — every
/// one of them has a sane default the demo binary falls back to).
const VALIDATED_VARS: &[(&str, fn(&str) -> bool)] = &[
    ("CACHE_DEMO_PORT", validate_port),
    ("CACHE_CAPACITY", validate_non_negative_number),
    ("CACHE_LOOKUP_WORKERS", validate_positive_number),
];

/// Validates the format of whichever of the demo's environment variables are
/// present, aggregating every problem into a single error rather than
/// failing on the first one found.
pub fn validate_env() -> Result<()> {
    let mut errors = Vec::new();

    for (var, validator) in VALIDATED_VARS {
        if let Ok(value) = env::var(var) {
            if !validator(&value) {
                errors.push(format!(
                    "Invalid value for environment variable {var}: '{value}'"
                ));
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!(
            "Environment configuration errors:\n  - {}",
            errors.join("\n  - ")
        );
    }

    Ok(())
}

/// Logs the demo binary's resolved configuration.
pub fn log_env_config() {
    tracing::info!("Environment configuration:");
    log_var("CACHE_DEMO_HOST");
    log_var("CACHE_DEMO_PORT");
    log_var("CACHE_CAPACITY");
    log_var("CACHE_LOOKUP_WORKERS");
    log_var("RUST_LOG");
    log_var("RUST_ENV");
}

fn log_var(name: &str) {
    if let Ok(value) = env::var(name) {
        tracing::info!("  {}: {}", name, value);
    }
}

/// Reads `CACHE_DEMO_HOST`, defaulting to `127.0.0.1`.
pub fn demo_host() -> String {
    env::var("CACHE_DEMO_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Reads `CACHE_DEMO_PORT`, defaulting to `8080`.
pub fn demo_port() -> Result<u16> {
    match env::var("CACHE_DEMO_PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("CACHE_DEMO_PORT '{value}' is not a valid port")),
        Err(_) => Ok(8080),
    }
}

/// Reads `CACHE_CAPACITY`, defaulting to `1024`.
pub fn cache_capacity() -> Result<usize> {
    match env::var("CACHE_CAPACITY") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("CACHE_CAPACITY '{value}' is not a valid size")),
        Err(_) => Ok(1024),
    }
}

/// Reads `CACHE_LOOKUP_WORKERS`, defaulting to `4`.
pub fn cache_lookup_workers() -> Result<usize> {
    match env::var("CACHE_LOOKUP_WORKERS") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("CACHE_LOOKUP_WORKERS '{value}' is not a valid worker count")),
        Err(_) => Ok(4),
    }
}

fn validate_port(value: &str) -> bool {
    value.parse::<u16>().is_ok()
}

fn validate_positive_number(value: &str) -> bool {
    value.parse::<u32>().map(|n| n > 0).unwrap_or(false)
}

fn validate_non_negative_number(value: &str) -> bool {
    value.parse::<u32>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port() {
        assert!(validate_port("8080"));
        assert!(validate_port("80"));
        assert!(validate_port("65535"));
        assert!(!validate_port("70000"));
        assert!(!validate_port("abc"));
        assert!(!validate_port("-1"));
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("1"));
        assert!(validate_positive_number("100"));
        assert!(!validate_positive_number("0"));
        assert!(!validate_positive_number("-1"));
        assert!(!validate_positive_number("abc"));
    }

    #[test]
    fn test_validate_non_negative_number() {
        assert!(validate_non_negative_number("0"));
        assert!(validate_non_negative_number("100"));
        assert!(!validate_non_negative_number("-1"));
        assert!(!validate_non_negative_number("abc"));
    }
}
