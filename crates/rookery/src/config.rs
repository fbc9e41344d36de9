//! Process-environment configuration, read once at startup and validated
//! eagerly — a malformed setting is rejected here rather than discovered on
//! the first connection that needs it.

use std::env;

use crate::RookeryError;

/// Server configuration sourced from the environment. `CLIENT_URL` may list
/// several comma-separated origins; an identity backend (token verification)
/// only turns on when both `DATABASE_URL` and `JWT_SECRET` are present.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub client_origins: Vec<String>,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub production: bool,
}

impl Config {
    /// Reads `PORT`, `CLIENT_URL`, `REDIS_URL`, `DATABASE_URL`, `JWT_SECRET`,
    /// and `NODE_ENV` from the process environment.
    pub fn from_env() -> Result<Self, RookeryError> {
        let port_raw = env::var("PORT").ok();
        let client_url_raw = env::var("CLIENT_URL").ok();
        let redis_url = env::var("REDIS_URL").ok();
        let database_url = env::var("DATABASE_URL").ok();
        let jwt_secret = env::var("JWT_SECRET").ok();
        let production = env::var("NODE_ENV").is_ok_and(|v| v == "production");

        Self::build(port_raw, client_url_raw, redis_url, database_url, jwt_secret, production)
    }

    /// The validation logic `from_env` drives, split out so it can be
    /// exercised directly in tests without touching real process state.
    fn build(
        port_raw: Option<String>,
        client_url_raw: Option<String>,
        redis_url: Option<String>,
        database_url: Option<String>,
        jwt_secret: Option<String>,
        production: bool,
    ) -> Result<Self, RookeryError> {
        let port = match port_raw {
            Some(raw) => raw
                .parse()
                .map_err(|_| RookeryError::Config(format!("PORT must be a number, got {raw:?}")))?,
            None => 8080,
        };

        let client_origins = client_url_raw
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if database_url.is_some() && jwt_secret.is_none() {
            return Err(RookeryError::Config(
                "DATABASE_URL is set but JWT_SECRET is missing — the identity backend needs a secret to verify tokens".into(),
            ));
        }

        Ok(Config {
            port,
            client_origins,
            redis_url,
            database_url,
            jwt_secret,
            production,
        })
    }

    /// Whether bearer tokens are verified at all. Off by default — every
    /// handshake then resolves through the guest/connection fallback only.
    pub fn identity_backend_enabled(&self) -> bool {
        self.database_url.is_some() && self.jwt_secret.is_some()
    }
}
