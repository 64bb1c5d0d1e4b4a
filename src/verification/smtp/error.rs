//! Maps transport-level SMTP failures onto probe outcomes.
//!
//! A failed session is never interpreted as a verdict on the address: a
//! refused connection or a dead socket says something about the host, not
//! the mailbox. The one exception is a rejection carried inside the error
//! text, since some servers slam the session shut on RCPT for unknown
//! users instead of answering with a structured response.

use std::error::Error as StdError;
use std::io;

use crate::core::models::ProbeOutcome;

/// Phrases servers use when a mailbox genuinely does not exist, as opposed
/// to policy rejections.
pub(crate) const REJECTION_PHRASES: &[&str] = &[
    "unknown",
    "no such",
    "unavailable",
    "rejected",
    "doesn't exist",
    "does not exist",
    "disabled",
    "invalid address",
    "recipient not found",
    "user unknown",
    "mailbox unavailable",
    "no mailbox",
    "address rejected",
    "invalid recipient",
    "invalid mailbox",
];

/// Classifies a transport error from any point in the session into a
/// timeout, a connection failure, or an unknown outcome.
pub(crate) fn outcome_for_transport_error(
    address: &str,
    host: &str,
    error: &lettre::transport::smtp::Error,
) -> ProbeOutcome {
    if let Some(kind) = io_error_kind(error) {
        match kind {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                tracing::warn!(target: "smtp_probe",
                    "Probe of <{address}> via {host} timed out waiting for the server");
                return ProbeOutcome::timed_out(address);
            }
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable => {
                tracing::warn!(target: "smtp_probe",
                    "Connection to {host} failed while probing <{address}>: {error}");
                return ProbeOutcome::connection_failed(address, error.to_string());
            }
            _ => {}
        }
    }

    let text = error.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("timed out") || lowered.contains("timeout") {
        tracing::warn!(target: "smtp_probe",
            "Probe of <{address}> via {host} timed out: {text}");
        ProbeOutcome::timed_out(address)
    } else if lowered.contains("connection refused")
        || lowered.contains("connection reset")
        || lowered.contains("network is unreachable")
        || lowered.contains("host is unreachable")
        || lowered.contains("incomplete response")
    {
        tracing::warn!(target: "smtp_probe",
            "Connection to {host} failed while probing <{address}>: {text}");
        ProbeOutcome::connection_failed(address, text)
    } else {
        tracing::warn!(target: "smtp_probe",
            "Unclassified transport error probing <{address}> via {host}: {text}");
        ProbeOutcome::unknown(address, None, text)
    }
}

/// Classifies an error raised by the RCPT command specifically. Some
/// servers report unknown users through a terminated session rather than a
/// structured response; a 550-family code in the error text with a
/// rejection phrase still counts as a conclusive rejection.
pub(crate) fn outcome_for_rcpt_error(
    address: &str,
    host: &str,
    error: &lettre::transport::smtp::Error,
) -> ProbeOutcome {
    let text = error.to_string();
    let lowered = text.to_lowercase();
    let is_nonexistent = text.contains("550")
        && REJECTION_PHRASES.iter().any(|p| lowered.contains(p));

    if is_nonexistent {
        tracing::info!(target: "smtp_probe",
            "RCPT TO rejected for <{address}> by {host}; mailbox likely does not exist: {text}");
        ProbeOutcome::invalid(address, Some(550), text)
    } else {
        outcome_for_transport_error(address, host, error)
    }
}

fn io_error_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(current) = source {
        if let Some(io_error) = current.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        source = current.source();
    }
    None
}
