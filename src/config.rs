use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

/// Default signing secret for local development only. Deployments provide
/// `/run/secrets/TOKEN_SECRET` or the `TOKEN_SECRET` environment variable.
const DEV_TOKEN_SECRET: &str = "profile-dev-secret-change-in-production";

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub token_secret: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PROFILE_PORT", "8080"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            token_secret: load_secret("TOKEN_SECRET"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn load_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    if let Ok(s) = read_to_string(&path) {
        return s.trim().to_string();
    }

    if let Ok(s) = env::var(secret_name) {
        return s;
    }

    warn!("{secret_name} not provided, falling back to the development secret");
    DEV_TOKEN_SECRET.to_string()
}
