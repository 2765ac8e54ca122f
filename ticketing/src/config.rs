//! Configuration management for the ticketing application.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values that are missing or fail to parse fall back to the default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use ticket_engine_core::{TicketCatalog, TicketType, User};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application server configuration
    pub server: ServerConfig,
    /// Order lifecycle configuration
    pub orders: OrderConfig,
    /// Ticket capacity configuration
    pub tickets: TicketConfig,
    /// Payment provider configuration
    pub payment: PaymentConfig,
    /// Users seeded into the in-memory directory
    pub users: UserSeedConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Default expiry window of an unpaid order, in minutes
pub const DEFAULT_EXPIRY_MINUTES: u32 = 30;

/// Longest accepted expiry window (one week)
pub const MAX_EXPIRY_MINUTES: u32 = 7 * 24 * 60;

/// Order lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Maximum number of tickets in one order
    pub limit: usize,
    /// Age in minutes after which an unpaid order is expired, in
    /// `1..=MAX_EXPIRY_MINUTES`
    pub expiry_minutes: u32,
    /// Seconds between two runs of the expiry sweeper
    pub sweep_interval_secs: u64,
}

impl OrderConfig {
    /// Expiry window as a duration
    #[must_use]
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.expiry_minutes))
    }
}

/// Ticket capacity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Capacity overrides (`TICKET_LIMIT_<TYPE>`); other types keep the
    /// built-in limit
    pub limits: BTreeMap<TicketType, usize>,
}

impl TicketConfig {
    /// Built-in catalog with the configured overrides applied
    #[must_use]
    pub fn catalog(&self) -> TicketCatalog {
        self.limits
            .iter()
            .fold(TicketCatalog::default(), |catalog, (ticket_type, limit)| {
                catalog.with_limit(*ticket_type, *limit)
            })
    }
}

/// Payment provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Base URL customers are redirected to for payment
    pub return_url: String,
    /// **DEVELOPMENT ONLY**: the mock provider reports every checkout as paid
    /// on its first status query.
    pub mock_auto_pay: bool,
}

/// Users seeded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSeedConfig {
    /// Regular users (`SEED_USERS`, comma-separated)
    pub users: Vec<String>,
    /// Administrators (`SEED_ADMINS`, comma-separated)
    pub admins: Vec<String>,
}

impl UserSeedConfig {
    /// Materialize the seeded users with fresh ids
    #[must_use]
    pub fn build(&self) -> Vec<User> {
        self.users
            .iter()
            .map(User::new)
            .chain(self.admins.iter().map(User::admin))
            .collect()
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let limits = TicketType::ALL
            .into_iter()
            .filter_map(|ticket_type| {
                parsed_value::<usize>(&lookup, &format!("TICKET_LIMIT_{}", ticket_type.as_str()))
                    .map(|limit| (ticket_type, limit))
            })
            .collect();

        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed_value(&lookup, "PORT").unwrap_or(8080),
                shutdown_timeout: parsed_value(&lookup, "SHUTDOWN_TIMEOUT").unwrap_or(30),
            },
            orders: OrderConfig {
                limit: parsed_value(&lookup, "ORDER_LIMIT").unwrap_or(5),
                expiry_minutes: parsed_value(&lookup, "ORDER_EXPIRY_MINUTES")
                    .filter(|minutes| (1..=MAX_EXPIRY_MINUTES).contains(minutes))
                    .unwrap_or(DEFAULT_EXPIRY_MINUTES),
                sweep_interval_secs: parsed_value(&lookup, "ORDER_SWEEP_INTERVAL_SECS")
                    .unwrap_or(60),
            },
            tickets: TicketConfig { limits },
            payment: PaymentConfig {
                return_url: lookup("PAYMENT_RETURN_URL")
                    .unwrap_or_else(|| "http://localhost:8080/payments/mock".to_string()),
                mock_auto_pay: parsed_value(&lookup, "PAYMENT_MOCK_AUTO_PAY").unwrap_or(false),
            },
            users: UserSeedConfig {
                users: list(lookup("SEED_USERS")),
                admins: lookup("SEED_ADMINS")
                    .map_or_else(|| vec!["admin".to_string()], |value| list(Some(value))),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parsed_value<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

fn list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect()
}
