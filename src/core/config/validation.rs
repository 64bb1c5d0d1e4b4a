//! Startup validation of runtime configuration. Unusable settings are the
//! only fatal errors in the engine; everything downstream degrades per
//! person or per candidate instead.

use std::str::FromStr;
use std::time::Duration;

use lettre::Address;

use super::Config;
use crate::core::error::{AppError, Result};

pub(crate) fn validate(config: &Config) -> Result<()> {
    if config.dns_servers.is_empty() {
        return Err(AppError::Config(
            "At least one DNS server must be configured".to_string(),
        ));
    }
    for server in &config.dns_servers {
        if server.parse::<std::net::IpAddr>().is_err() {
            return Err(AppError::Config(format!(
                "Invalid DNS server address: '{server}'"
            )));
        }
    }

    if Address::from_str(&config.smtp_sender_email).is_err()
        || !config.email_regex.is_match(&config.smtp_sender_email)
    {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email: '{}'",
            config.smtp_sender_email
        )));
    }

    if config.smtp_helo_domain.trim().is_empty() {
        return Err(AppError::Config(
            "SMTP HELO domain must not be empty".to_string(),
        ));
    }

    if config.smtp_timeout.is_zero() {
        return Err(AppError::Config(
            "SMTP timeout must be greater than zero".to_string(),
        ));
    }
    if config.dns_timeout.is_zero() {
        return Err(AppError::Config(
            "DNS timeout must be greater than zero".to_string(),
        ));
    }

    if config.per_domain_delay < config.global_delay {
        tracing::warn!(target: "config",
            "Per-domain delay {:?} is below the global floor {:?}; the global floor will dominate",
            config.per_domain_delay, config.global_delay
        );
    }
    if config.per_domain_delay.is_zero() && config.global_delay.is_zero() {
        return Err(AppError::Config(
            "At least one probe delay (per-domain or global) must be non-zero".to_string(),
        ));
    }

    if config.person_deadline < Duration::from_secs(1) {
        return Err(AppError::Config(
            "Person deadline must be at least one second".to_string(),
        ));
    }

    if config.max_concurrency == 0 {
        return Err(AppError::Config(
            "max_concurrency must be at least 1".to_string(),
        ));
    }

    Ok(())
}
