//! Manages application configuration loaded from environment variables.
//!
//! This module defines the `Config` struct which holds all runtime settings
//! and provides `from_env` to populate it. It supports loading variables
//! from a `.env` file via the `dotenv` crate and provides default values
//! for optional settings.

use crate::smtp::parser::Fallback8Bit;
use anyhow::{anyhow, Result};

/// Baseline per-command line length limit (octets), before EHLO extension growth.
pub const COMMAND_SIZE_LIMIT: usize = 512;

/// Default maximum DATA payload size in octets (32 MiB). Zero disables the limit.
pub const DATA_SIZE_LIMIT_DEFAULT: usize = 33_554_432;

/// Holds the engine's immutable, per-process runtime configuration.
///
/// Constructed once via `from_env` (or directly, e.g. in tests) and shared
/// read-only across every session the server spawns.
#[derive(Debug, Clone)]
pub struct Config {
    /// The IP address the SMTP server should listen on. (Optional: `MAILBROKER_BIND_ADDRESS`, Default: "0.0.0.0")
    pub bind_address: String,

    /// The network port the SMTP server should listen on. (Optional: `MAILBROKER_PORT`, Default: 2525)
    pub port: u16,

    /// The greeting hostname advertised in `220`/`HELO`/`EHLO` replies. (Optional: `MAILBROKER_HOSTNAME`, Default: system FQDN)
    pub hostname: String,

    /// The ident string appended to the `220` greeting (`220 <hostname> <ident>`).
    /// Not configurable via the environment; overridable in code for tests.
    pub ident: String,

    /// Maximum bytes of DATA payload accepted; 0 disables the limit and the SIZE advertisement.
    /// (Optional: `MAILBROKER_DATA_SIZE_LIMIT`, Default: 33554432)
    pub data_size_limit: usize,

    /// Advertises the SMTPUTF8 extension. Mutually exclusive with `decode_data`.
    /// (Optional: `MAILBROKER_ENABLE_SMTPUTF8`, Default: false)
    pub enable_smtputf8: bool,

    /// If true, the payload handed to the handler is decoded text rather than
    /// raw bytes, and 8BITMIME is not advertised.
    /// (Optional: `MAILBROKER_DECODE_DATA`, Default: false)
    pub decode_data: bool,

    /// Single-byte fallback encoding used when an argument or payload isn't
    /// valid UTF-8.
    pub default_8bit_encoding: Fallback8Bit,

    /// Baseline per-command line length limit; grown per-session during EHLO.
    pub command_size_limit: usize,
}

impl Config {
    /// Loads configuration from environment variables, applying defaults for
    /// everything optional.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if a port variable is set but isn't a valid `u16`,
    /// or if both `MAILBROKER_ENABLE_SMTPUTF8` and `MAILBROKER_DECODE_DATA`
    /// are set true (the engine can't decode UTF-8 payloads to text while
    /// also promising clients raw-bytes SMTPUTF8 delivery).
    pub fn from_env() -> Result<Self> {
        // Attempt to load variables from a .env file, if it exists. Ignore errors.
        let _ = dotenv::dotenv();

        let bind_address = std::env::var("MAILBROKER_BIND_ADDRESS").unwrap_or_else(|_| {
            let default_val = "0.0.0.0".to_string();
            log::info!("Config: Using default bind_address: {}", default_val);
            default_val
        });

        let port_str = std::env::var("MAILBROKER_PORT").unwrap_or_else(|_| "2525".to_string());
        let port: u16 = port_str.parse().map_err(|e| {
            anyhow!(
                "MAILBROKER_PORT ('{}') must be a valid u16 port number: {}",
                port_str,
                e
            )
        })?;
        log::info!("Config: Using port: {}", port);

        let hostname = std::env::var("MAILBROKER_HOSTNAME").unwrap_or_else(|_| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string())
        });
        log::info!("Config: Using hostname: {}", hostname);

        let data_size_limit: usize = std::env::var("MAILBROKER_DATA_SIZE_LIMIT")
            .unwrap_or_else(|_| DATA_SIZE_LIMIT_DEFAULT.to_string())
            .parse()
            .map_err(|e| anyhow!("MAILBROKER_DATA_SIZE_LIMIT must be a valid usize: {}", e))?;
        log::info!("Config: Using data_size_limit: {}", data_size_limit);

        let enable_smtputf8 = parse_bool_env("MAILBROKER_ENABLE_SMTPUTF8")?;
        let decode_data = parse_bool_env("MAILBROKER_DECODE_DATA")?;

        if enable_smtputf8 && decode_data {
            return Err(anyhow!(
                "MAILBROKER_ENABLE_SMTPUTF8 and MAILBROKER_DECODE_DATA cannot both be true"
            ));
        }

        Ok(Config {
            bind_address,
            port,
            hostname,
            ident: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            data_size_limit,
            enable_smtputf8,
            decode_data,
            default_8bit_encoding: Fallback8Bit::Latin1,
            command_size_limit: COMMAND_SIZE_LIMIT,
        })
    }
}

fn parse_bool_env(name: &str) -> Result<bool> {
    match std::env::var(name) {
        Ok(val) => val
            .parse::<bool>()
            .map_err(|e| anyhow!("{} must be 'true' or 'false': {}", name, e)),
        Err(_) => Ok(false),
    }
}

mod tests;
