//! Defines the structure mirroring the TOML configuration file format.

use serde::Deserialize;
use std::path::Path;

use crate::core::error::{AppError, Result};

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) dns: DnsConfig,
    #[serde(default)]
    pub(crate) smtp: SmtpConfig,
    #[serde(default)]
    pub(crate) rate: RateConfig,
    #[serde(default)]
    pub(crate) verification: VerificationConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsConfig {
    pub(crate) dns_timeout: Option<u64>,
    pub(crate) dns_servers: Option<Vec<String>>,
    pub(crate) cache_ttl: Option<u64>,
    pub(crate) negative_cache_ttl: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct SmtpConfig {
    pub(crate) smtp_timeout: Option<u64>,
    pub(crate) smtp_port: Option<u16>,
    pub(crate) smtp_sender_email: Option<String>,
    pub(crate) smtp_helo_domain: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct RateConfig {
    pub(crate) per_domain_delay_ms: Option<u64>,
    pub(crate) global_delay_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct VerificationConfig {
    pub(crate) person_deadline: Option<u64>,
    pub(crate) max_concurrency: Option<usize>,
}

impl ConfigFile {
    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [smtp]
            smtp_timeout = 10
            smtp_sender_email = "probe@scout.test"

            [rate]
            per_domain_delay_ms = 1500
            "#,
        )
        .expect("valid TOML should parse");
        assert_eq!(file.smtp.smtp_timeout, Some(10));
        assert_eq!(file.rate.per_domain_delay_ms, Some(1500));
        assert_eq!(file.dns.dns_timeout, None);
    }

    #[test]
    fn rejects_unknown_fields() {
        let parsed: std::result::Result<ConfigFile, _> = toml::from_str(
            r#"
            [smtp]
            smtp_tiemout = 10
            "#,
        );
        assert!(parsed.is_err());
    }
}
