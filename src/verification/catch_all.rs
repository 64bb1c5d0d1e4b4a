//! Classifies whether a domain accepts mail for arbitrary local-parts.
//!
//! The classifier probes a synthetic address that almost certainly does
//! not exist. If the server accepts it, positive verdicts on real
//! addresses at that domain prove nothing, and the verifier downgrades
//! them accordingly. The classification is cached per domain and computed
//! at most once per cache lifetime, with concurrent callers waiting on a
//! single in-flight probe.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::core::config::Config;
use crate::core::models::{CatchAllStatus, DomainProfile, ProbeVerdict};
use crate::rate::RateController;
use crate::verification::smtp::SmtpProber;

struct CachedStatus {
    status: CatchAllStatus,
    stored_at: Instant,
}

type StatusSlot = Arc<AsyncMutex<Option<CachedStatus>>>;

pub struct CatchAllClassifier {
    config: Arc<Config>,
    prober: SmtpProber,
    rate: Arc<RateController>,
    slots: parking_lot::Mutex<HashMap<String, StatusSlot>>,
}

impl CatchAllClassifier {
    pub fn new(config: Arc<Config>, prober: SmtpProber, rate: Arc<RateController>) -> Self {
        Self {
            config,
            prober,
            rate,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the domain's catch-all status, probing once if it has not
    /// been classified within the cache lifetime.
    pub async fn classify(&self, profile: &DomainProfile) -> CatchAllStatus {
        let slot = self.slot(&profile.domain);
        let mut guard = slot.lock().await;

        if let Some(cached) = guard.as_ref() {
            if cached.stored_at.elapsed() < self.config.cache_ttl {
                tracing::debug!(target: "catch_all",
                    "Cached catch-all status for {}: {:?}", profile.domain, cached.status);
                return cached.status;
            }
        }

        let status = self.classify_uncached(profile).await;
        *guard = Some(CachedStatus {
            status,
            stored_at: Instant::now(),
        });
        status
    }

    async fn classify_uncached(&self, profile: &DomainProfile) -> CatchAllStatus {
        let synthetic = synthetic_address(&profile.domain);
        tracing::debug!(target: "catch_all",
            "Classifying {} with synthetic address <{synthetic}>", profile.domain);

        for mx in &profile.mx_hosts {
            let _permit = self.rate.acquire(&profile.domain).await;
            let outcome = self.prober.probe(&mx.host, &synthetic).await;

            match outcome.verdict {
                ProbeVerdict::Valid => {
                    tracing::warn!(target: "catch_all",
                        "Domain {} (MX: {}) accepted the synthetic address; treating as catch-all",
                        profile.domain, mx.host
                    );
                    return CatchAllStatus::CatchAll;
                }
                ProbeVerdict::Invalid => {
                    tracing::debug!(target: "catch_all",
                        "Domain {} (MX: {}) rejected the synthetic address; not a catch-all",
                        profile.domain, mx.host
                    );
                    return CatchAllStatus::NotCatchAll;
                }
                // The probe never reached the server; the next MX host may
                // still answer.
                ProbeVerdict::ConnectionFailed => continue,
                ProbeVerdict::Timeout | ProbeVerdict::Unknown => {
                    tracing::info!(target: "catch_all",
                        "Catch-all probe for {} inconclusive ({:?})",
                        profile.domain, outcome.verdict
                    );
                    return CatchAllStatus::Unknown;
                }
            }
        }

        tracing::info!(target: "catch_all",
            "No MX host for {} answered the catch-all probe", profile.domain);
        CatchAllStatus::Unknown
    }

    fn slot(&self, domain: &str) -> StatusSlot {
        let mut slots = self.slots.lock();
        slots
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }
}

/// Builds a random address that almost certainly has no mailbox.
fn synthetic_address(domain: &str) -> String {
    format!(
        "no-reply-does-not-exist-{}-{:x}@{}",
        rand::thread_rng().gen_range(10000..99999),
        rand::thread_rng().gen::<u32>(),
        domain
    )
}
