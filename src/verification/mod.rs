//! Verification pipeline: SMTP probing, catch-all classification, and the
//! orchestrator composing them into a per-person discovery routine.

pub mod catch_all;
pub mod smtp;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::candidates;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::{
    CandidateAddress, CatchAllStatus, Confidence, DomainProfile, MxHost, Person, ProbeOutcome,
    ProbeVerdict, VerificationResult,
};
use crate::dns::{MxLookup, MxResolver};
use crate::rate::RateController;
use self::catch_all::CatchAllClassifier;
use self::smtp::SmtpProber;

/// Composes the pipeline stages into the per-person discovery routine.
///
/// One verifier is shared across workers: the domain cache, catch-all
/// cache, and rate controller inside it are the only cross-person state,
/// and all of them are safe to share.
pub struct Verifier {
    config: Arc<Config>,
    resolver: MxResolver,
    classifier: CatchAllClassifier,
    prober: SmtpProber,
    rate: Arc<RateController>,
}

impl Verifier {
    /// Builds a verifier backed by the configured upstream DNS servers.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let resolver = MxResolver::new(Arc::clone(&config))?;
        Ok(Self::assemble(config, resolver))
    }

    /// Builds a verifier over a custom DNS facility.
    pub fn with_lookup(config: Arc<Config>, lookup: Arc<dyn MxLookup>) -> Self {
        let resolver = MxResolver::with_lookup(Arc::clone(&config), lookup);
        Self::assemble(config, resolver)
    }

    fn assemble(config: Arc<Config>, resolver: MxResolver) -> Self {
        let rate = Arc::new(RateController::new(&config));
        let prober = SmtpProber::new(Arc::clone(&config));
        let classifier =
            CatchAllClassifier::new(Arc::clone(&config), prober.clone(), Arc::clone(&rate));
        Self {
            config,
            resolver,
            classifier,
            prober,
            rate,
        }
    }

    /// Discovers and verifies an address for one person.
    ///
    /// Never fails: DNS dead-ends, unreachable hosts, and ambiguous
    /// responses all degrade into a result with `Unknown` confidence. The
    /// full probe history is returned for auditing.
    pub async fn verify(&self, person: &Person) -> VerificationResult {
        let deadline = Instant::now() + self.config.person_deadline;
        tracing::info!(target: "verifier",
            "Verifying {} at {}", person.full_name, person.domain);

        let mut profile = match self.resolver.resolve(&person.domain).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(target: "verifier",
                    "No usable mail route for {}: {e}", person.domain);
                return VerificationResult::unresolved(person.clone());
            }
        };
        profile.catch_all = self.classifier.classify(&profile).await;

        let candidates = candidates::generate(&person.full_name, &person.domain);
        if candidates.is_empty() {
            tracing::warn!(target: "verifier",
                "No usable candidates for '{}' at {}", person.full_name, person.domain);
            return VerificationResult::exhausted(person.clone(), Vec::new());
        }
        tracing::debug!(target: "verifier",
            "Probing {} candidate(s) for {} in priority order",
            candidates.len(), person.full_name
        );

        let mut attempts: Vec<ProbeOutcome> = Vec::new();
        for candidate in &candidates {
            if Instant::now() >= deadline {
                tracing::warn!(target: "verifier",
                    "Deadline reached for {} after {} attempt(s)",
                    person.full_name, attempts.len()
                );
                break;
            }

            let verdict = self
                .probe_candidate(&profile, candidate, &mut attempts)
                .await;

            if verdict == ProbeVerdict::Valid {
                let confidence = confidence_for(profile.catch_all);
                tracing::info!(target: "verifier",
                    "Found address {} for {} (confidence: {:?})",
                    candidate.address, person.full_name, confidence
                );
                return VerificationResult::found(
                    person.clone(),
                    candidate.address.clone(),
                    confidence,
                    attempts,
                );
            }
        }

        tracing::info!(target: "verifier",
            "No address confirmed for {} at {} ({} attempt(s))",
            person.full_name, person.domain, attempts.len()
        );
        VerificationResult::exhausted(person.clone(), attempts)
    }

    /// Verifies a batch of persons through a bounded worker pool. Results
    /// come back in input order; all probes still pass through the shared
    /// rate controller.
    pub async fn verify_many(&self, persons: &[Person]) -> Vec<VerificationResult> {
        stream::iter(persons)
            .map(|person| self.verify(person))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    /// Probes one candidate, falling through the domain's MX hosts when a
    /// host is unreachable. Every probe issued is appended to `attempts`.
    async fn probe_candidate(
        &self,
        profile: &DomainProfile,
        candidate: &CandidateAddress,
        attempts: &mut Vec<ProbeOutcome>,
    ) -> ProbeVerdict {
        let mut verdict = ProbeVerdict::ConnectionFailed;
        for mx in &profile.mx_hosts {
            let _permit = self.rate.acquire(&profile.domain).await;
            let outcome = self.prober.probe(&mx.host, &candidate.address).await;
            verdict = outcome.verdict;
            attempts.push(outcome);

            match verdict {
                ProbeVerdict::ConnectionFailed => {
                    tracing::warn!(target: "verifier",
                        "Host {} unreachable for <{}>, trying next MX host",
                        mx.host, candidate.address
                    );
                    continue;
                }
                // A timeout is not retried against another host: the
                // server saw the probe, and hammering siblings of a slow
                // host works against the rate limits.
                _ => return verdict,
            }
        }
        verdict
    }

    /// The primary mail host for a domain, mostly useful for diagnostics.
    pub async fn primary_mx(&self, domain: &str) -> Result<MxHost> {
        let profile = self.resolver.resolve(domain).await?;
        profile
            .mx_hosts
            .first()
            .cloned()
            .ok_or_else(|| crate::core::error::AppError::NoDnsRecords(domain.to_string()))
    }
}

fn confidence_for(status: CatchAllStatus) -> Confidence {
    match status {
        CatchAllStatus::NotCatchAll => Confidence::Confirmed,
        CatchAllStatus::CatchAll => Confidence::LikelyCatchAll,
        CatchAllStatus::Unknown => Confidence::Unknown,
    }
}
