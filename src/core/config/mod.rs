//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading, building, and validation.

pub(crate) mod builder;
pub(crate) mod file;
pub(crate) mod validation;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use regex::Regex;
use std::time::Duration;

/// Runtime configuration settings used by the email-scout core logic.
#[derive(Clone)]
pub struct Config {
    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,
    /// How long a successful domain resolution (and its catch-all
    /// classification) stays cached.
    pub cache_ttl: Duration,
    /// How long a failed resolution is cached before the domain is retried.
    pub negative_cache_ttl: Duration,

    pub smtp_timeout: Duration,
    pub smtp_port: u16,
    pub smtp_sender_email: String,
    pub smtp_helo_domain: String,

    /// Minimum spacing between probes to the same domain.
    pub per_domain_delay: Duration,
    /// Minimum spacing between any two probes, to any domain.
    pub global_delay: Duration,

    /// Overall budget for verifying a single person.
    pub person_deadline: Duration,
    pub max_concurrency: usize,

    pub email_regex: Regex,

    pub loaded_config_path: Option<String>,
}

impl Config {
    fn build_default() -> Self {
        let email_regex_pattern = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b";
        let email_regex = Regex::new(email_regex_pattern)
            .expect("Default email regex pattern failed to compile. This is a bug.");
        let dns_servers = vec![
            "8.8.8.8".to_string(),
            "8.8.4.4".to_string(),
            "1.1.1.1".to_string(),
            "1.0.0.1".to_string(),
        ];

        Config {
            dns_timeout: Duration::from_secs(5),
            dns_servers,
            cache_ttl: Duration::from_secs(3600),
            negative_cache_ttl: Duration::from_secs(60),
            smtp_timeout: Duration::from_secs(5),
            smtp_port: 25,
            smtp_sender_email: "verify-probe@example.com".to_string(),
            smtp_helo_domain: "localhost".to_string(),
            per_domain_delay: Duration::from_secs(1),
            global_delay: Duration::from_millis(200),
            person_deadline: Duration::from_secs(60),
            max_concurrency: std::thread::available_parallelism()
                .map_or(1, |n| n.get())
                .max(1),
            email_regex,
            loaded_config_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::build_default()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("dns_timeout", &self.dns_timeout)
            .field("dns_servers_count", &self.dns_servers.len())
            .field("cache_ttl", &self.cache_ttl)
            .field("negative_cache_ttl", &self.negative_cache_ttl)
            .field("smtp_timeout", &self.smtp_timeout)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_sender_email", &self.smtp_sender_email)
            .field("smtp_helo_domain", &self.smtp_helo_domain)
            .field("per_domain_delay", &self.per_domain_delay)
            .field("global_delay", &self.global_delay)
            .field("person_deadline", &self.person_deadline)
            .field("max_concurrency", &self.max_concurrency)
            .field("email_regex", &self.email_regex.as_str())
            .field("loaded_config_path", &self.loaded_config_path)
            .finish()
    }
}
