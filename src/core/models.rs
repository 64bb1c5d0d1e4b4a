//! Core data structures shared across the discovery pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// A person to discover an email address for: a display name plus the
/// domain their mailbox is expected to live under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub full_name: String,
    pub domain: String,
}

impl Person {
    pub fn new(full_name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            domain: domain.into(),
        }
    }
}

/// The naming patterns used to derive candidate local-parts, in probe
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailPattern {
    /// `first@domain`
    First,
    /// `first.last@domain`
    FirstDotLast,
    /// `flast@domain`
    InitialLast,
    /// `f.last@domain`
    InitialDotLast,
    /// `last@domain`
    Last,
    /// `firstlast@domain`
    FirstLast,
    /// `lastfirst@domain`
    LastFirst,
    /// `last.first@domain`
    LastDotFirst,
    /// `first_last@domain`
    FirstUnderscoreLast,
    /// `first-last@domain`
    FirstHyphenLast,
}

/// A single generated address candidate. Ordering across candidates is
/// significant: probing stops at the first confirmed hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAddress {
    pub local_part: String,
    pub address: String,
    pub pattern: EmailPattern,
}

/// A mail-exchanger host advertised for a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxHost {
    pub preference: u16,
    pub host: String,
}

impl MxHost {
    pub fn new(preference: u16, host: impl Into<String>) -> Self {
        Self {
            preference,
            host: host.into(),
        }
    }
}

/// Whether a domain accepts mail for arbitrary local-parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchAllStatus {
    /// Not yet classified, or the classification probe was inconclusive.
    Unknown,
    /// The domain accepted a synthetic address; positive verdicts on real
    /// addresses are non-diagnostic.
    CatchAll,
    /// The domain rejected a synthetic address; positive verdicts count.
    NotCatchAll,
}

/// A domain's resolved mail route plus its catch-all classification.
/// Cached per domain for the configured TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainProfile {
    pub domain: String,
    /// Mail-exchanger hosts in ascending preference order, host-name ties
    /// broken lexically.
    pub mx_hosts: Vec<MxHost>,
    pub catch_all: CatchAllStatus,
    pub resolved_at: DateTime<Utc>,
}

/// Verdict of a single SMTP handshake probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeVerdict {
    /// The server accepted the recipient (final RCPT response was 2xx).
    Valid,
    /// The server rejected the recipient as unknown (550/551/553).
    Invalid,
    /// Ambiguous or temporary response; proof of neither state.
    Unknown,
    /// No response within the probe timeout.
    Timeout,
    /// The connection could not be established or was torn down mid-session.
    ConnectionFailed,
}

/// The immutable record of one probe attempt against one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub address: String,
    /// The final SMTP status code observed, when the session got that far.
    pub smtp_code: Option<u16>,
    pub verdict: ProbeVerdict,
    /// The server's response text, kept for diagnostics.
    pub raw_message: Option<String>,
}

/// How much trust to place in a discovered address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Accepted by a server known to reject unknown recipients.
    Confirmed,
    /// Accepted, but the domain accepts anything.
    LikelyCatchAll,
    /// No conclusive signal either way.
    Unknown,
}

/// Final artifact of a verification run for one person. The full attempt
/// history is retained so callers can audit how the verdict was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub person: Person,
    pub address: Option<String>,
    pub confidence: Confidence,
    pub attempts: Vec<ProbeOutcome>,
}

impl VerificationResult {
    /// Result for a person whose domain had no usable mail route.
    pub fn unresolved(person: Person) -> Self {
        Self {
            person,
            address: None,
            confidence: Confidence::Unknown,
            attempts: Vec::new(),
        }
    }

    /// Result after exhausting every candidate without a positive verdict.
    pub fn exhausted(person: Person, attempts: Vec<ProbeOutcome>) -> Self {
        Self {
            person,
            address: None,
            confidence: Confidence::Unknown,
            attempts,
        }
    }

    /// Result for an accepted candidate, qualified by the domain's
    /// catch-all status.
    pub fn found(
        person: Person,
        address: String,
        confidence: Confidence,
        attempts: Vec<ProbeOutcome>,
    ) -> Self {
        Self {
            person,
            address: Some(address),
            confidence,
            attempts,
        }
    }

    /// Serializes the result for the downstream consumer.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
