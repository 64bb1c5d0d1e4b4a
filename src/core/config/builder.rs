//! Builder for assembling a validated runtime [`Config`].

use std::path::Path;
use std::time::Duration;

use super::file::ConfigFile;
use super::validation::validate;
use super::Config;
use crate::core::error::Result;

/// Builds a [`Config`] from defaults, an optional TOML file, and
/// programmatic overrides, in that precedence order.
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    file: Option<ConfigFile>,
    file_path: Option<String>,
    overrides: Overrides,
}

#[derive(Debug, Default, Clone)]
struct Overrides {
    dns_timeout: Option<Duration>,
    dns_servers: Option<Vec<String>>,
    cache_ttl: Option<Duration>,
    negative_cache_ttl: Option<Duration>,
    smtp_timeout: Option<Duration>,
    smtp_port: Option<u16>,
    smtp_sender_email: Option<String>,
    smtp_helo_domain: Option<String>,
    per_domain_delay: Option<Duration>,
    global_delay: Option<Duration>,
    person_deadline: Option<Duration>,
    max_concurrency: Option<usize>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers settings from a TOML file under any programmatic overrides.
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        self.file = Some(ConfigFile::load(path)?);
        self.file_path = Some(path.display().to_string());
        tracing::debug!(target: "config", "Loaded configuration file: {}", path.display());
        Ok(self)
    }

    pub fn dns_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.dns_timeout = Some(timeout);
        self
    }

    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns_servers = Some(servers);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.overrides.cache_ttl = Some(ttl);
        self
    }

    pub fn negative_cache_ttl(mut self, ttl: Duration) -> Self {
        self.overrides.negative_cache_ttl = Some(ttl);
        self
    }

    pub fn smtp_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.smtp_timeout = Some(timeout);
        self
    }

    pub fn smtp_port(mut self, port: u16) -> Self {
        self.overrides.smtp_port = Some(port);
        self
    }

    pub fn smtp_sender_email(mut self, sender: impl Into<String>) -> Self {
        self.overrides.smtp_sender_email = Some(sender.into());
        self
    }

    pub fn smtp_helo_domain(mut self, helo: impl Into<String>) -> Self {
        self.overrides.smtp_helo_domain = Some(helo.into());
        self
    }

    pub fn per_domain_delay(mut self, delay: Duration) -> Self {
        self.overrides.per_domain_delay = Some(delay);
        self
    }

    pub fn global_delay(mut self, delay: Duration) -> Self {
        self.overrides.global_delay = Some(delay);
        self
    }

    pub fn person_deadline(mut self, deadline: Duration) -> Self {
        self.overrides.person_deadline = Some(deadline);
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.overrides.max_concurrency = Some(limit);
        self
    }

    /// Produces the final validated configuration.
    pub fn build(self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(file) = &self.file {
            apply_file(&mut config, file);
        }
        apply_overrides(&mut config, &self.overrides);
        config.loaded_config_path = self.file_path.clone();

        validate(&config)?;
        Ok(config)
    }
}

fn apply_file(config: &mut Config, file: &ConfigFile) {
    if let Some(secs) = file.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(secs);
    }
    if let Some(servers) = &file.dns.dns_servers {
        config.dns_servers = servers.clone();
    }
    if let Some(secs) = file.dns.cache_ttl {
        config.cache_ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = file.dns.negative_cache_ttl {
        config.negative_cache_ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = file.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(secs);
    }
    if let Some(port) = file.smtp.smtp_port {
        config.smtp_port = port;
    }
    if let Some(sender) = &file.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.clone();
    }
    if let Some(helo) = &file.smtp.smtp_helo_domain {
        config.smtp_helo_domain = helo.clone();
    }
    if let Some(ms) = file.rate.per_domain_delay_ms {
        config.per_domain_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = file.rate.global_delay_ms {
        config.global_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = file.verification.person_deadline {
        config.person_deadline = Duration::from_secs(secs);
    }
    if let Some(limit) = file.verification.max_concurrency {
        config.max_concurrency = limit;
    }
}

fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(timeout) = overrides.dns_timeout {
        config.dns_timeout = timeout;
    }
    if let Some(servers) = &overrides.dns_servers {
        config.dns_servers = servers.clone();
    }
    if let Some(ttl) = overrides.cache_ttl {
        config.cache_ttl = ttl;
    }
    if let Some(ttl) = overrides.negative_cache_ttl {
        config.negative_cache_ttl = ttl;
    }
    if let Some(timeout) = overrides.smtp_timeout {
        config.smtp_timeout = timeout;
    }
    if let Some(port) = overrides.smtp_port {
        config.smtp_port = port;
    }
    if let Some(sender) = &overrides.smtp_sender_email {
        config.smtp_sender_email = sender.clone();
    }
    if let Some(helo) = &overrides.smtp_helo_domain {
        config.smtp_helo_domain = helo.clone();
    }
    if let Some(delay) = overrides.per_domain_delay {
        config.per_domain_delay = delay;
    }
    if let Some(delay) = overrides.global_delay {
        config.global_delay = delay;
    }
    if let Some(deadline) = overrides.person_deadline {
        config.person_deadline = deadline;
    }
    if let Some(limit) = overrides.max_concurrency {
        config.max_concurrency = limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_default() {
        let config = ConfigBuilder::new()
            .smtp_timeout(Duration::from_secs(9))
            .per_domain_delay(Duration::from_millis(250))
            .build()
            .expect("valid config");
        assert_eq!(config.smtp_timeout, Duration::from_secs(9));
        assert_eq!(config.per_domain_delay, Duration::from_millis(250));
    }

    #[test]
    fn invalid_sender_rejected_at_build() {
        let result = ConfigBuilder::new().smtp_sender_email("not-an-address").build();
        assert!(result.is_err());
    }
}
