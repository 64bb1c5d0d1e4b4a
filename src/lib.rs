//! # email-scout
//!
//! Discovers a likely-valid email address for a named person at a domain
//! without ever sending them a message, and distinguishes catch-all
//! domains from domains that genuinely validate recipients.
//!
//! The pipeline: a pure candidate generator proposes addresses in priority
//! order; a caching MX resolver supplies the domain's mail route; a
//! catch-all classifier probes a synthetic address once per domain; then
//! handshake-only SMTP probes, spaced out by a shared rate controller,
//! test each candidate until one is accepted or the list is exhausted.
//!
//! ```no_run
//! use std::sync::Arc;
//! use email_scout_core::{Config, Person, Verifier};
//!
//! # async fn run() -> email_scout_core::Result<()> {
//! let config = Arc::new(Config::default());
//! let verifier = Verifier::new(config)?;
//! let result = verifier
//!     .verify(&Person::new("Jane Doe", "example.com"))
//!     .await;
//! if let Some(address) = &result.address {
//!     println!("{address} ({:?})", result.confidence);
//! }
//! # Ok(())
//! # }
//! ```

pub mod candidates;
pub mod core;
pub mod dns;
pub mod rate;
pub mod verification;

pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    CandidateAddress, CatchAllStatus, Confidence, DomainProfile, EmailPattern, MxHost, Person,
    ProbeOutcome, ProbeVerdict, VerificationResult,
};
pub use crate::dns::{MxLookup, MxResolver};
pub use crate::rate::{RateController, RatePermit};
pub use crate::verification::catch_all::CatchAllClassifier;
pub use crate::verification::smtp::{test_smtp_connectivity, SmtpProber};
pub use crate::verification::Verifier;
