//! Resolves a domain to its ordered mail-exchanger hosts, with a
//! process-lifetime cache.
//!
//! Lookups go through the [`MxLookup`] seam so the engine can run against
//! the real resolver in production and a stub in tests. Successful
//! resolutions are cached for the configured TTL; failures are cached for a
//! shorter negative TTL so a broken domain is not hammered repeatedly
//! within one run. Concurrent callers for the same domain wait on a single
//! in-flight resolution instead of duplicating it.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{CatchAllStatus, DomainProfile, MxHost};

/// The DNS facility the resolver consumes: an MX record lookup plus an
/// address-record existence check used for the implicit-host fallback.
pub trait MxLookup: Send + Sync {
    /// MX records for `domain`, in server order. An empty list means the
    /// domain exists but advertises no mail exchangers.
    fn lookup_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<Vec<MxHost>>>;

    /// Whether `domain` itself resolves to at least one address record.
    fn lookup_host<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<bool>>;
}

impl MxLookup for TokioAsyncResolver {
    fn lookup_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<Vec<MxHost>>> {
        async move {
            match self.mx_lookup(domain).await {
                Ok(lookup) => Ok(lookup
                    .iter()
                    .map(|mx| MxHost::new(mx.preference(), mx.exchange().to_utf8()))
                    .collect()),
                Err(e) => match classify_resolve_error(&e, domain) {
                    // No MX records is not an error here: the caller falls
                    // back to the domain's own address record.
                    DnsFailure::NoRecords(_) => Ok(Vec::new()),
                    failure => Err(failure.into_app_error()),
                },
            }
        }
        .boxed()
    }

    fn lookup_host<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<bool>> {
        async move {
            match self.lookup_ip(domain).await {
                Ok(lookup) => Ok(lookup.iter().next().is_some()),
                Err(e) => match classify_resolve_error(&e, domain) {
                    DnsFailure::NoRecords(_) | DnsFailure::NxDomain(_) => Ok(false),
                    failure => Err(failure.into_app_error()),
                },
            }
        }
        .boxed()
    }
}

/// Cloneable mirror of the DNS-family error variants, so failed
/// resolutions can be replayed out of the negative cache.
#[derive(Debug, Clone)]
enum DnsFailure {
    NxDomain(String),
    NoRecords(String),
    Timeout(String),
    Resolve(ResolveError),
}

impl DnsFailure {
    fn into_app_error(self) -> AppError {
        match self {
            DnsFailure::NxDomain(domain) => AppError::NxDomain(domain),
            DnsFailure::NoRecords(domain) => AppError::NoDnsRecords(domain),
            DnsFailure::Timeout(domain) => AppError::DnsTimeout(domain),
            DnsFailure::Resolve(e) => AppError::Dns(e),
        }
    }

    fn from_app_error(error: &AppError, domain: &str) -> Self {
        match error {
            AppError::NxDomain(d) => DnsFailure::NxDomain(d.clone()),
            AppError::NoDnsRecords(d) => DnsFailure::NoRecords(d.clone()),
            AppError::DnsTimeout(d) => DnsFailure::Timeout(d.clone()),
            AppError::Dns(e) => DnsFailure::Resolve(e.clone()),
            other => DnsFailure::Resolve(ResolveError::from(format!(
                "{domain}: {other}"
            ))),
        }
    }
}

fn classify_resolve_error(error: &ResolveError, domain: &str) -> DnsFailure {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            DnsFailure::NxDomain(domain.to_string())
        }
        ResolveErrorKind::NoRecordsFound { .. } => DnsFailure::NoRecords(domain.to_string()),
        ResolveErrorKind::Timeout => DnsFailure::Timeout(domain.to_string()),
        _ => DnsFailure::Resolve(error.clone()),
    }
}

struct CachedResolution {
    outcome: std::result::Result<Vec<MxHost>, DnsFailure>,
    resolved_at: DateTime<Utc>,
    stored_at: Instant,
}

type CacheSlot = Arc<AsyncMutex<Option<CachedResolution>>>;

/// Resolves and caches mail routes per domain.
pub struct MxResolver {
    lookup: Arc<dyn MxLookup>,
    config: Arc<Config>,
    slots: parking_lot::Mutex<HashMap<String, CacheSlot>>,
}

impl MxResolver {
    /// Builds a resolver backed by the configured upstream DNS servers.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let mut ips: Vec<IpAddr> = Vec::with_capacity(config.dns_servers.len());
        for server in &config.dns_servers {
            ips.push(server.parse()?);
        }
        let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
        let resolver_config = ResolverConfig::from_parts(None, vec![], group);
        let mut opts = ResolverOpts::default();
        opts.timeout = config.dns_timeout;
        let resolver = TokioAsyncResolver::tokio(resolver_config, opts);
        Ok(Self::with_lookup(config, Arc::new(resolver)))
    }

    /// Builds a resolver over a custom DNS facility. The seam tests use to
    /// substitute a scripted lookup.
    pub fn with_lookup(config: Arc<Config>, lookup: Arc<dyn MxLookup>) -> Self {
        Self {
            lookup,
            config,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `domain` to its mail route, consulting the cache first.
    ///
    /// The returned profile carries `CatchAllStatus::Unknown`; the
    /// classifier fills that in separately.
    pub async fn resolve(&self, domain: &str) -> Result<DomainProfile> {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        if domain.is_empty() {
            return Err(AppError::NoDnsRecords("<empty domain>".to_string()));
        }

        let slot = self.slot(&domain);
        // Holding the slot across the lookup is what de-duplicates
        // concurrent resolutions of the same domain.
        let mut guard = slot.lock().await;

        if let Some(cached) = guard.as_ref() {
            let ttl = match cached.outcome {
                Ok(_) => self.config.cache_ttl,
                Err(_) => self.config.negative_cache_ttl,
            };
            if cached.stored_at.elapsed() < ttl {
                tracing::debug!(target: "mx_resolver", "Cache hit for domain {domain}");
                return match &cached.outcome {
                    Ok(hosts) => Ok(self.profile(&domain, hosts.clone(), cached.resolved_at)),
                    Err(failure) => Err(failure.clone().into_app_error()),
                };
            }
        }

        let outcome = self.resolve_uncached(&domain).await;
        let resolved_at = Utc::now();
        *guard = Some(CachedResolution {
            outcome: match &outcome {
                Ok(hosts) => Ok(hosts.clone()),
                Err(e) => Err(DnsFailure::from_app_error(e, &domain)),
            },
            resolved_at,
            stored_at: Instant::now(),
        });

        outcome.map(|hosts| self.profile(&domain, hosts, resolved_at))
    }

    async fn resolve_uncached(&self, domain: &str) -> Result<Vec<MxHost>> {
        tracing::debug!(target: "mx_resolver", "Resolving MX records for {domain}");
        let mut hosts = self.lookup.lookup_mx(domain).await?;

        if hosts.is_empty() {
            // Standard mail-routing fallback: a domain without MX records
            // receives mail at its own address record.
            tracing::debug!(target: "mx_resolver",
                "No MX records for {domain}, checking address-record fallback");
            if self.lookup.lookup_host(domain).await? {
                hosts.push(MxHost::new(0, domain));
            } else {
                tracing::info!(target: "mx_resolver",
                    "Domain {domain} has neither MX nor address records");
                return Err(AppError::NoDnsRecords(domain.to_string()));
            }
        }

        for host in &mut hosts {
            host.host = host.host.trim_end_matches('.').to_lowercase();
        }
        hosts.sort_by(|a, b| {
            a.preference
                .cmp(&b.preference)
                .then_with(|| a.host.cmp(&b.host))
        });
        hosts.dedup();

        tracing::info!(target: "mx_resolver",
            "Resolved {domain} to {} mail host(s), primary: {}",
            hosts.len(),
            hosts[0].host
        );
        Ok(hosts)
    }

    fn profile(
        &self,
        domain: &str,
        mx_hosts: Vec<MxHost>,
        resolved_at: DateTime<Utc>,
    ) -> DomainProfile {
        DomainProfile {
            domain: domain.to_string(),
            mx_hosts,
            catch_all: CatchAllStatus::Unknown,
            resolved_at,
        }
    }

    fn slot(&self, domain: &str) -> CacheSlot {
        let mut slots = self.slots.lock();
        slots
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }
}
