use serde::Deserialize;

use crate::lifecycle::engine::DEFAULT_MAX_ISSUE;
use crate::lifecycle::export::DEFAULT_PAGE_SIZE;
use crate::lifecycle::generator::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TOKEN_BYTES, MIN_TOKEN_BYTES};

const PLACEHOLDER_ADMIN_KEY: &str = "changeme";
const PLACEHOLDER_VALIDATOR_KEY: &str = "set-a-long-random-validator-key";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// PostgreSQL URL, or `memory` for the in-process store.
    pub database_url: String,
    pub admin_key: String,
    pub validator_key: String,
    /// Public origin used in ticket URLs (e.g. `https://tickets.example.com`).
    /// When unset, URLs are derived from the request `Host` header.
    pub base_url: Option<String>,
    /// Random bytes per token. Set via GATEPASS_TOKEN_BYTES. Default: 9 (72 bits).
    pub token_bytes: usize,
    /// Per-call issuance cap. Set via GATEPASS_MAX_ISSUE. Default: 1000.
    pub max_issue: usize,
    /// Generation attempts per token before giving up. Default: 5.
    pub generation_attempts: u32,
    /// Row cap for JSON export and listings. Default: 200.
    pub export_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            database_url: "postgres://localhost/gatepass".into(),
            admin_key: PLACEHOLDER_ADMIN_KEY.into(),
            validator_key: PLACEHOLDER_VALIDATOR_KEY.into(),
            base_url: None,
            token_bytes: DEFAULT_TOKEN_BYTES,
            max_issue: DEFAULT_MAX_ISSUE,
            generation_attempts: DEFAULT_MAX_ATTEMPTS,
            export_limit: DEFAULT_PAGE_SIZE as usize,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|name| std::env::var(name).ok())
}

/// Build a config from an arbitrary variable lookup. `load()` passes the process env.
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let admin_key = get("GATEPASS_ADMIN_KEY").unwrap_or(defaults.admin_key);
    let validator_key = get("GATEPASS_VALIDATOR_KEY").unwrap_or(defaults.validator_key);

    let placeholders: Vec<&str> = [
        (admin_key == PLACEHOLDER_ADMIN_KEY).then_some("GATEPASS_ADMIN_KEY"),
        (validator_key == PLACEHOLDER_VALIDATOR_KEY).then_some("GATEPASS_VALIDATOR_KEY"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !placeholders.is_empty() {
        let env_mode = get("GATEPASS_ENV")
            .or_else(|| get("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "{} still set to the insecure placeholder. \
                 Set real keys before running in production.",
                placeholders.join(", ")
            );
        }
        eprintln!(
            "⚠️  {} not set — using insecure placeholder. Set real keys for production.",
            placeholders.join(", ")
        );
    }

    let token_bytes: usize = parse_or(&get, "GATEPASS_TOKEN_BYTES", defaults.token_bytes);
    if token_bytes < MIN_TOKEN_BYTES {
        anyhow::bail!(
            "GATEPASS_TOKEN_BYTES must be at least {} (64 bits), got {}",
            MIN_TOKEN_BYTES,
            token_bytes
        );
    }

    Ok(Config {
        port: parse_or(&get, "GATEPASS_PORT", defaults.port),
        database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
        admin_key,
        validator_key,
        base_url: get("GATEPASS_BASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        token_bytes,
        max_issue: parse_or(&get, "GATEPASS_MAX_ISSUE", defaults.max_issue).max(1),
        generation_attempts: parse_or(
            &get,
            "GATEPASS_GENERATION_ATTEMPTS",
            defaults.generation_attempts,
        )
        .max(1),
        export_limit: parse_or(&get, "GATEPASS_EXPORT_LIMIT", defaults.export_limit).max(1),
    })
}

fn parse_or<F, T>(get: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(name).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.token_bytes, 9);
        assert_eq!(cfg.max_issue, 1000);
        assert_eq!(cfg.generation_attempts, 5);
        assert_eq!(cfg.export_limit, 200);
        assert!(cfg.base_url.is_none());
    }

    #[test]
    fn test_overrides_and_garbage_fallback() {
        let cfg = from_lookup(lookup(&[
            ("GATEPASS_PORT", "8080"),
            ("GATEPASS_MAX_ISSUE", "not-a-number"),
            ("GATEPASS_BASE_URL", "  https://tickets.example  "),
            ("DATABASE_URL", "memory"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_issue, 1000);
        assert_eq!(cfg.base_url.as_deref(), Some("https://tickets.example"));
        assert_eq!(cfg.database_url, "memory");
    }

    #[test]
    fn test_production_refuses_placeholder_keys() {
        let err = from_lookup(lookup(&[
            ("GATEPASS_ENV", "production"),
            ("GATEPASS_ADMIN_KEY", "a-real-admin-key"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GATEPASS_VALIDATOR_KEY"));
        assert!(!err.to_string().contains("GATEPASS_ADMIN_KEY"));
    }

    #[test]
    fn test_production_accepts_real_keys() {
        let cfg = from_lookup(lookup(&[
            ("GATEPASS_ENV", "production"),
            ("GATEPASS_ADMIN_KEY", "a-real-admin-key"),
            ("GATEPASS_VALIDATOR_KEY", "a-real-validator-key"),
        ]))
        .unwrap();
        assert_eq!(cfg.validator_key, "a-real-validator-key");
    }

    #[test]
    fn test_token_bytes_below_floor_rejected() {
        assert!(from_lookup(lookup(&[("GATEPASS_TOKEN_BYTES", "4")])).is_err());
    }
}
