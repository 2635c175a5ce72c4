// common/src/config.rs
// Defaults de los flags de clap, sobreescribibles por variables de entorno.

use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MASTER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REDUCE_COUNT: u32 = 10;
pub const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_DONE_LINGER_SECS: u64 = 2;
pub const DEFAULT_APP: &str = "wordcount";

/// Parsea un valor crudo (ya leído del entorno); si falta o no parsea,
/// devuelve `default`.
pub fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Lee `name` y lo parsea con `parse_or`.
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    parse_or(env::var(name).ok().as_deref(), default)
}

pub fn env_string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// URL base del master.
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://127.0.0.1:8080
pub fn master_base_url() -> String {
    env_string_or("MASTER_URL", DEFAULT_MASTER_URL)
}

pub fn listen_addr() -> String {
    env_string_or("MASTER_LISTEN", DEFAULT_LISTEN_ADDR)
}

pub fn reduce_count() -> u32 {
    env_or("REDUCE_COUNT", DEFAULT_REDUCE_COUNT)
}

pub fn lease_timeout() -> Duration {
    Duration::from_secs(env_or("LEASE_TIMEOUT_SECS", DEFAULT_LEASE_TIMEOUT_SECS))
}

pub fn poll_backoff() -> Duration {
    Duration::from_millis(env_or("POLL_BACKOFF_MS", DEFAULT_POLL_BACKOFF_MS))
}

pub fn done_linger() -> Duration {
    Duration::from_secs(env_or("DONE_LINGER_SECS", DEFAULT_DONE_LINGER_SECS))
}

pub fn intermediate_dir() -> String {
    env_string_or("INTERMEDIATE_DIR", ".")
}

pub fn output_dir() -> String {
    env_string_or("OUTPUT_DIR", ".")
}

pub fn app_name() -> String {
    env_string_or("MR_APP", DEFAULT_APP)
}
