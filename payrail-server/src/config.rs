//! Server configuration.
//!
//! Loaded from a TOML file with `$VAR` / `${VAR}` environment expansion in
//! string values. `CONFIG` selects the file (default `config.toml`); `HOST`
//! and `PORT` override the bind address after loading.
//!
//! # Example
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3000
//! rpc_url = "$RPC_URL"
//! mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
//! ledger_path = "payrail-ledger"
//!
//! [mesh]
//! api_server = "https://api.example-mesh.network"
//! channel = "PAYRAIL_V1"
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

use payrail::error::PaymentError;
use payrail_svm::broadcast::BroadcastConfig;
use payrail_svm::fees::PriorityLevel;
use payrail_svm::rail::RailConfig;
use payrail_svm::validate::ValidateConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Bind port (default `3000`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Settlement network RPC endpoint.
    #[serde(default)]
    pub rpc_url: String,

    /// Mint of the payment token, base58 (default: USDC mainnet).
    #[serde(default = "default_mint")]
    pub mint: String,

    /// Decimals used when rendering ledger amounts back to human units
    /// (default `6`, matching the default mint).
    #[serde(default = "default_display_decimals")]
    pub display_decimals: u8,

    /// Target inclusion service level for drafts (default `high`).
    #[serde(default)]
    pub priority_level: PriorityLevel,

    /// Path of the sled ledger directory (default `payrail-ledger`).
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Message store connection.
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Send/confirm loop tuning.
    #[serde(default)]
    pub confirm: ConfirmConfig,

    /// Settled-transaction fetch tuning.
    #[serde(default)]
    pub settle_fetch: SettleFetchConfig,
}

/// Message store endpoints and channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Base URL of the content-addressed message network API.
    pub api_server: String,
    /// Channel permission records are published to.
    pub channel: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            api_server: "http://127.0.0.1:4024".to_owned(),
            channel: "PAYRAIL_V1".to_owned(),
        }
    }
}

/// Send/confirm loop tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfirmConfig {
    /// One confirmation race, in milliseconds.
    pub timeout_ms: u64,
    /// Status poll interval inside a race, in milliseconds.
    pub poll_interval_ms: u64,
    /// Submit/confirm round ceiling.
    pub max_rounds: usize,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            poll_interval_ms: 400,
            max_rounds: 150,
        }
    }
}

/// Settled-transaction fetch tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettleFetchConfig {
    /// Delay between fetch attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Fetch attempt ceiling.
    pub max_attempts: usize,
}

impl Default for SettleFetchConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1_000,
            max_attempts: 30,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    3000
}

fn default_mint() -> String {
    payrail_svm::USDC_MINT.to_string()
}

const fn default_display_decimals() -> u8 {
    6
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("payrail-ledger")
}

impl ServerConfig {
    /// Loads configuration from the path in the `CONFIG` environment
    /// variable, falling back to `config.toml`. A missing file yields the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InputInvalid`] if the file cannot be read or
    /// parsed.
    pub fn load() -> Result<Self, PaymentError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path, expanding environment
    /// references and applying `HOST` / `PORT` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InputInvalid`] if the file cannot be read or
    /// parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, PaymentError> {
        let path = path.as_ref();
        let raw = if path.exists() {
            std::fs::read_to_string(path)
                .map_err(|e| PaymentError::InputInvalid(format!("config {}: {e}", path.display())))?
        } else {
            String::new()
        };

        let expanded = expand_env(&raw);
        let mut config: Self = toml::from_str(&expanded)
            .map_err(|e| PaymentError::InputInvalid(format!("config {}: {e}", path.display())))?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse()
        {
            config.port = port;
        }

        Ok(config)
    }

    /// The rail tuning derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InputInvalid`] if the configured mint is not
    /// a valid address.
    pub fn rail_config(&self) -> Result<RailConfig, PaymentError> {
        let mint: Pubkey = self
            .mint
            .parse()
            .map_err(|_| PaymentError::InputInvalid(format!("invalid mint {:?}", self.mint)))?;
        Ok(RailConfig {
            mint,
            priority_level: self.priority_level,
            broadcast: BroadcastConfig {
                confirm_timeout: Duration::from_millis(self.confirm.timeout_ms),
                status_poll_interval: Duration::from_millis(self.confirm.poll_interval_ms),
                max_rounds: self.confirm.max_rounds,
            },
            validate: ValidateConfig {
                fetch_retry_delay: Duration::from_millis(self.settle_fetch.retry_delay_ms),
                max_fetch_attempts: self.settle_fetch.max_attempts,
            },
        })
    }
}

/// Expands `$VAR` and `${VAR}` references from the process environment.
/// Unresolved references are left in place.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        rest = &rest[dollar + 1..];

        let (name, consumed) = if let Some(stripped) = rest.strip_prefix('{') {
            match stripped.find('}') {
                Some(end) => (&stripped[..end], end + 2),
                None => {
                    out.push('$');
                    continue;
                }
            }
        } else {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            (&rest[..end], end)
        };

        if name.is_empty() {
            out.push('$');
            continue;
        }

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&rest[..consumed]);
            }
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}
