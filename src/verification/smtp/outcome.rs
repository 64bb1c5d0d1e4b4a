//! Constructors for probe outcomes.

use crate::core::models::{ProbeOutcome, ProbeVerdict};

impl ProbeOutcome {
    /// The server accepted the recipient.
    pub fn valid(address: &str, code: u16, message: String) -> Self {
        Self {
            address: address.to_string(),
            smtp_code: Some(code),
            verdict: ProbeVerdict::Valid,
            raw_message: Some(message),
        }
    }

    /// The server rejected the recipient as unknown.
    pub fn invalid(address: &str, code: Option<u16>, message: String) -> Self {
        Self {
            address: address.to_string(),
            smtp_code: code,
            verdict: ProbeVerdict::Invalid,
            raw_message: Some(message),
        }
    }

    /// Ambiguous or temporary response; proof of neither state.
    pub fn unknown(address: &str, code: Option<u16>, message: String) -> Self {
        Self {
            address: address.to_string(),
            smtp_code: code,
            verdict: ProbeVerdict::Unknown,
            raw_message: Some(message),
        }
    }

    /// No response within the probe timeout.
    pub fn timed_out(address: &str) -> Self {
        Self {
            address: address.to_string(),
            smtp_code: None,
            verdict: ProbeVerdict::Timeout,
            raw_message: None,
        }
    }

    /// The session could not be established.
    pub fn connection_failed(address: &str, message: String) -> Self {
        Self {
            address: address.to_string(),
            smtp_code: None,
            verdict: ProbeVerdict::ConnectionFailed,
            raw_message: Some(message),
        }
    }

    pub fn is_conclusive(&self) -> bool {
        matches!(self.verdict, ProbeVerdict::Valid | ProbeVerdict::Invalid)
    }
}
