// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::Duration;
use std::net::SocketAddr;

const DEFAULT_DB_URL: &str = "sqlite://database/taskboard.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 12 * 60;
const MAX_TOKEN_TTL_MINUTES: i64 = 366 * 24 * 60;

/// Credentials of the superadmin account created on startup when missing.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

/// Server settings, read from `TASKBOARD_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests don't have to touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url =
            lookup("TASKBOARD_DATABASE_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_string());

        let bind_addr = lookup("TASKBOARD_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("TASKBOARD_BIND_ADDR is not a valid socket address")?;

        let token_secret = match lookup("TASKBOARD_TOKEN_SECRET") {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                tracing::warn!(
                    "TASKBOARD_TOKEN_SECRET is not set; using a random secret. Issued tokens will not survive a restart."
                );
                random_secret()?
            }
        };

        let ttl_minutes = match lookup("TASKBOARD_TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .context("TASKBOARD_TOKEN_TTL_MINUTES must be an integer")?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            anyhow::bail!(
                "TASKBOARD_TOKEN_TTL_MINUTES must be between 1 and {}",
                MAX_TOKEN_TTL_MINUTES
            );
        }
        let token_ttl = Duration::try_minutes(ttl_minutes)
            .context("TASKBOARD_TOKEN_TTL_MINUTES is out of range")?;

        let bootstrap_admin = match (
            lookup("TASKBOARD_ADMIN_EMAIL"),
            lookup("TASKBOARD_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            token_secret,
            token_ttl,
            bootstrap_admin,
        })
    }
}

fn random_secret() -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; 32];
    getrandom::getrandom(&mut bytes).context("Failed to generate a token secret")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DB_URL);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.token_secret.len(), 32);
        assert_eq!(config.token_ttl, Duration::hours(12));
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("TASKBOARD_DATABASE_URL", "sqlite::memory:"),
            ("TASKBOARD_BIND_ADDR", "127.0.0.1:8080"),
            ("TASKBOARD_TOKEN_SECRET", "s3cret"),
            ("TASKBOARD_TOKEN_TTL_MINUTES", "5"),
            ("TASKBOARD_ADMIN_EMAIL", "root@example.com"),
            ("TASKBOARD_ADMIN_PASSWORD", "hunter22"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.token_secret, b"s3cret".to_vec());
        assert_eq!(config.token_ttl, Duration::minutes(5));
        assert_eq!(config.bootstrap_admin.unwrap().email, "root@example.com");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ServerConfig::from_lookup(lookup_from(&[("TASKBOARD_BIND_ADDR", "nowhere")])).is_err());
        assert!(
            ServerConfig::from_lookup(lookup_from(&[("TASKBOARD_TOKEN_TTL_MINUTES", "0")])).is_err()
        );
        let huge_values = ["200000000000".to_string(), i64::MAX.to_string()];
        for huge in &huge_values {
            assert!(
                ServerConfig::from_lookup(lookup_from(&[(
                    "TASKBOARD_TOKEN_TTL_MINUTES",
                    huge.as_str()
                )]))
                .is_err(),
                "{huge}"
            );
        }
        let year = MAX_TOKEN_TTL_MINUTES.to_string();
        let config = ServerConfig::from_lookup(lookup_from(&[(
            "TASKBOARD_TOKEN_TTL_MINUTES",
            year.as_str(),
        )]))
        .unwrap();
        assert_eq!(config.token_ttl, Duration::days(366));
    }
}
