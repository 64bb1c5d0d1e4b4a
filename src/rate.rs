//! Throttles probe issuance per-domain and globally.
//!
//! Every probe in the process, no matter which worker issues it, passes
//! through one shared controller. Two independent floors are enforced: a
//! per-domain minimum spacing and a global minimum spacing across all
//! domains; a caller waits for whichever constraint is stricter. Permits
//! are granted in request order (the async mutexes queue waiters FIFO), so
//! the controller never reorders probes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::core::config::Config;

type LastIssued = Arc<AsyncMutex<Option<Instant>>>;

/// A granted right to issue one probe. Purely a receipt: issuance times
/// are recorded at grant, so dropping the permit has no effect.
#[derive(Debug)]
pub struct RatePermit {
    pub domain: String,
    pub granted_at: Instant,
}

/// The single serialization point for probe scheduling.
pub struct RateController {
    per_domain_delay: Duration,
    global_delay: Duration,
    global: LastIssued,
    domains: parking_lot::Mutex<HashMap<String, LastIssued>>,
}

impl RateController {
    pub fn new(config: &Config) -> Self {
        Self {
            per_domain_delay: config.per_domain_delay,
            global_delay: config.global_delay,
            global: Arc::new(AsyncMutex::new(None)),
            domains: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until both the per-domain and global spacing constraints
    /// allow another probe to `domain`, then returns a permit.
    pub async fn acquire(&self, domain: &str) -> RatePermit {
        let slot = self.domain_slot(domain);

        // The domain lock is held while waiting on the global floor, so a
        // queued caller cannot slip past an earlier one for the same domain.
        let mut last_domain = slot.lock().await;
        if let Some(previous) = *last_domain {
            let ready_at = previous + self.per_domain_delay;
            if ready_at > Instant::now() {
                tracing::debug!(target: "rate_limit",
                    "Waiting {:?} for per-domain slot on {domain}",
                    ready_at - Instant::now()
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let mut last_global = self.global.lock().await;
        if let Some(previous) = *last_global {
            let ready_at = previous + self.global_delay;
            if ready_at > Instant::now() {
                tracing::debug!(target: "rate_limit",
                    "Waiting {:?} for the global probe floor",
                    ready_at - Instant::now()
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        *last_global = Some(now);
        *last_domain = Some(now);

        RatePermit {
            domain: domain.to_string(),
            granted_at: now,
        }
    }

    fn domain_slot(&self, domain: &str) -> LastIssued {
        let mut domains = self.domains.lock();
        domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }
}
