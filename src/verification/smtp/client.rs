//! Provides the SmtpProber for observing whether a mail host accepts an
//! address, via a handshake-only session.

use super::error::{outcome_for_rcpt_error, outcome_for_transport_error, REJECTION_PHRASES};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{ProbeOutcome, ProbeVerdict};

use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Ehlo, Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Response;
use lettre::Address;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Issues handshake probes against mail-exchanger hosts.
///
/// Each probe opens a fresh session: greeting, `EHLO`, `MAIL FROM`,
/// `RCPT TO`, `QUIT`. Message data is never sent. The session is closed
/// cleanly on every exit path, including errors, so sockets are not leaked
/// and the remote server sees a polite client.
#[derive(Clone)]
pub struct SmtpProber {
    config: Arc<Config>,
}

struct SessionParams {
    host: String,
    port: u16,
    helo: ClientId,
    sender: Address,
    recipient: Address,
    address: String,
    timeout: Duration,
}

enum SessionFlow {
    Done(ProbeOutcome),
    /// The server refused the plaintext session and demanded STARTTLS.
    NeedsTls,
}

impl SmtpProber {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Probes `address` through `host` and reports the observed verdict.
    ///
    /// Transport failures surface as `Timeout`/`ConnectionFailed` outcomes,
    /// never as errors: a probe always yields a `ProbeOutcome` the caller
    /// can append to the attempt history.
    pub async fn probe(&self, host: &str, address: &str) -> ProbeOutcome {
        tracing::debug!(target: "smtp_probe", "Starting SMTP check for <{address}> via {host}");

        if !self.config.email_regex.is_match(address) {
            tracing::warn!(target: "smtp_probe", "Refusing to probe malformed address '{address}'");
            return ProbeOutcome::invalid(address, None, "Malformed address".to_string());
        }
        let recipient = match Address::from_str(address) {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(target: "smtp_probe", "Invalid recipient address '{address}': {e}");
                return ProbeOutcome::invalid(address, None, format!("Invalid address: {e}"));
            }
        };
        let sender = match Address::from_str(&self.config.smtp_sender_email) {
            Ok(addr) => addr,
            Err(e) => {
                // Config validation should make this unreachable; degrade
                // to an inconclusive outcome rather than panic.
                tracing::error!(target: "smtp_probe", "Invalid sender address in config: {e}");
                return ProbeOutcome::unknown(address, None, format!("Invalid sender: {e}"));
            }
        };

        let params = SessionParams {
            host: host.to_string(),
            port: self.config.smtp_port,
            helo: ClientId::Domain(self.config.smtp_helo_domain.clone()),
            sender,
            recipient,
            address: address.to_string(),
            timeout: self.config.smtp_timeout,
        };

        // The socket timeouts inside the session are the real guard; this
        // outer budget only catches a blocking task that wedges entirely.
        let budget = self.config.smtp_timeout * 3 + Duration::from_secs(1);
        let task = tokio::task::spawn_blocking(move || run_probe(&params));

        match tokio::time::timeout(budget, task).await {
            Ok(Ok(outcome)) => {
                tracing::info!(target: "smtp_probe",
                    "Probe of <{address}> via {host}: verdict={:?}, code={:?}",
                    outcome.verdict, outcome.smtp_code
                );
                outcome
            }
            Ok(Err(join_error)) => {
                tracing::error!(target: "smtp_probe",
                    "Probe task for <{address}> via {host} failed: {join_error}");
                ProbeOutcome::unknown(address, None, format!("Probe task failed: {join_error}"))
            }
            Err(_) => {
                tracing::warn!(target: "smtp_probe",
                    "Probe of <{address}> via {host} exceeded its overall budget");
                ProbeOutcome::timed_out(address)
            }
        }
    }
}

fn run_probe(params: &SessionParams) -> ProbeOutcome {
    match run_session(params, false) {
        SessionFlow::Done(outcome) => outcome,
        SessionFlow::NeedsTls => {
            tracing::info!(target: "smtp_probe",
                "Server {} requires STARTTLS, retrying <{}> over TLS",
                params.host, params.address
            );
            match run_session(params, true) {
                SessionFlow::Done(outcome) => outcome,
                SessionFlow::NeedsTls => ProbeOutcome::unknown(
                    &params.address,
                    None,
                    "Server demanded STARTTLS on the TLS session".to_string(),
                ),
            }
        }
    }
}

fn run_session(params: &SessionParams, use_tls: bool) -> SessionFlow {
    let socket_addr = match (params.host.as_str(), params.port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                return SessionFlow::Done(ProbeOutcome::connection_failed(
                    &params.address,
                    format!("Could not resolve mail host {}", params.host),
                ))
            }
        },
        Err(e) => {
            return SessionFlow::Done(ProbeOutcome::connection_failed(
                &params.address,
                format!("Could not resolve mail host {}: {e}", params.host),
            ))
        }
    };

    let tls_parameters = if use_tls {
        match TlsParameters::new(params.host.clone()) {
            Ok(tls) => Some(tls),
            Err(e) => {
                return SessionFlow::Done(ProbeOutcome::connection_failed(
                    &params.address,
                    format!("TLS setup failed for {}: {e}", params.host),
                ))
            }
        }
    } else {
        None
    };

    tracing::debug!(target: "smtp_probe",
        "Connecting to {} at {} (TLS: {use_tls})", params.host, socket_addr);

    let mut conn = match SmtpConnection::connect(
        socket_addr,
        Some(params.timeout),
        &params.helo,
        tls_parameters.as_ref(),
        None,
    ) {
        Ok(conn) => conn,
        Err(e) => {
            return SessionFlow::Done(outcome_for_transport_error(
                &params.address,
                &params.host,
                &e,
            ))
        }
    };

    if let Err(e) = conn.command(Ehlo::new(params.helo.clone())) {
        let outcome = outcome_for_transport_error(&params.address, &params.host, &e);
        conn.quit().ok();
        return SessionFlow::Done(outcome);
    }

    tracing::debug!(target: "smtp_probe",
        "Sending MAIL FROM:<{}> to {}", params.sender, params.host);
    match conn.command(Mail::new(Some(params.sender.clone()), vec![])) {
        Ok(response) if response.is_positive() => {}
        Ok(response) => {
            let code = response_code(&response);
            let message = response_message(&response);
            conn.quit().ok();
            if !use_tls && requires_starttls(code, &message) {
                return SessionFlow::NeedsTls;
            }
            tracing::warn!(target: "smtp_probe",
                "MAIL FROM rejected by {}: {code} {message}", params.host);
            return SessionFlow::Done(ProbeOutcome::unknown(
                &params.address,
                Some(code),
                format!("MAIL FROM rejected: {message}"),
            ));
        }
        Err(e) => {
            let outcome = outcome_for_transport_error(&params.address, &params.host, &e);
            conn.quit().ok();
            return SessionFlow::Done(outcome);
        }
    }

    tracing::debug!(target: "smtp_probe",
        "Sending RCPT TO:<{}> to {}", params.address, params.host);
    let outcome = match conn.command(Rcpt::new(params.recipient.clone(), vec![])) {
        Ok(response) => {
            let code = response_code(&response);
            let message = response_message(&response);
            tracing::info!(target: "smtp_probe",
                "RCPT TO:<{}> response from {}: {code} {message}",
                params.address, params.host
            );
            interpret_rcpt_response(&params.address, code, message)
        }
        Err(e) => outcome_for_rcpt_error(&params.address, &params.host, &e),
    };

    conn.quit().ok();
    SessionFlow::Done(outcome)
}

/// Maps the final `RCPT TO` response onto a probe outcome.
///
/// `2xx` accepts the recipient; `550`/`551`/`553` (or a 5xx carrying an
/// explicit unknown-mailbox phrase) rejects it conclusively; every other
/// `4xx`/`5xx` is ambiguous and proves nothing about the address.
pub(crate) fn interpret_rcpt_response(address: &str, code: u16, message: String) -> ProbeOutcome {
    match code {
        200..=299 => ProbeOutcome::valid(address, code, message),
        550 | 551 | 553 => ProbeOutcome::invalid(address, Some(code), message),
        500..=599 => {
            let lowered = message.to_lowercase();
            if REJECTION_PHRASES.iter().any(|p| lowered.contains(p)) {
                ProbeOutcome::invalid(address, Some(code), message)
            } else {
                ProbeOutcome::unknown(address, Some(code), message)
            }
        }
        _ => ProbeOutcome::unknown(address, Some(code), message),
    }
}

fn requires_starttls(code: u16, message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("starttls") || (code == 530 && message.contains("5.7.0"))
}

fn response_code(response: &Response) -> u16 {
    response.code().to_string().parse::<u16>().unwrap_or(0)
}

fn response_message(response: &Response) -> String {
    response.message().collect::<Vec<&str>>().join(" ")
}

/// Tests basic SMTP connectivity to a known reliable server (Google).
/// This helps diagnose if outbound port 25 is generally blocked.
pub async fn test_smtp_connectivity(config: &Config) -> Result<()> {
    tracing::info!(target: "smtp_probe", "Testing outbound SMTP (port 25) connectivity to Google...");

    let test_server = "gmail-smtp-in.l.google.com";
    let test_port = 25u16;

    let socket_addr = match (test_server, test_port)
        .to_socket_addrs()
        .map_err(|e| {
            AppError::Initialization(format!("DNS resolution failed for {test_server}: {e}"))
        })?
        .next()
    {
        Some(addr) => addr,
        None => {
            return Err(AppError::Initialization(format!(
                "Could not resolve any IP address for {test_server}"
            )));
        }
    };

    let helo = ClientId::Domain(config.smtp_helo_domain.clone());
    let timeout = config.smtp_timeout;

    let task = tokio::task::spawn_blocking(move || {
        SmtpConnection::connect(socket_addr, Some(timeout), &helo, None, None)
    });

    match tokio::time::timeout(timeout + Duration::from_secs(1), task).await {
        Ok(Ok(Ok(mut conn))) => {
            tracing::info!(target: "smtp_probe",
                "SMTP connectivity test successful (connected to {test_server}).");
            conn.quit().ok();
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("connection refused") || err_str.contains("network is unreachable") {
                Err(AppError::SmtpInconclusive(format!(
                    "Connection to {test_server} refused or network unreachable. Check firewall or network settings."
                )))
            } else {
                Err(AppError::Smtp(e))
            }
        }
        Ok(Err(join_error)) => Err(AppError::Task(join_error.to_string())),
        Err(_) => Err(AppError::SmtpInconclusive(
            "SMTP connection timed out - port 25 is likely blocked.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_2xx_as_valid() {
        let outcome = interpret_rcpt_response("a@b.com", 250, "OK".to_string());
        assert_eq!(outcome.verdict, ProbeVerdict::Valid);
        assert_eq!(outcome.smtp_code, Some(250));
    }

    #[test]
    fn user_unknown_codes_are_invalid() {
        for code in [550, 551, 553] {
            let outcome =
                interpret_rcpt_response("a@b.com", code, "5.1.1 mailbox rejected".to_string());
            assert_eq!(outcome.verdict, ProbeVerdict::Invalid, "code {code}");
        }
    }

    #[test]
    fn other_5xx_without_phrase_is_unknown() {
        let outcome =
            interpret_rcpt_response("a@b.com", 554, "5.7.1 relay access denied".to_string());
        assert_eq!(outcome.verdict, ProbeVerdict::Unknown);
    }

    #[test]
    fn other_5xx_with_rejection_phrase_is_invalid() {
        let outcome =
            interpret_rcpt_response("a@b.com", 554, "5.1.1 User unknown".to_string());
        assert_eq!(outcome.verdict, ProbeVerdict::Invalid);
    }

    #[test]
    fn transient_4xx_is_unknown() {
        let outcome =
            interpret_rcpt_response("a@b.com", 451, "greylisted, try later".to_string());
        assert_eq!(outcome.verdict, ProbeVerdict::Unknown);
        assert_eq!(outcome.smtp_code, Some(451));
    }

    #[test]
    fn starttls_detection() {
        assert!(requires_starttls(530, "5.7.0 Must issue a STARTTLS command first"));
        assert!(requires_starttls(530, "5.7.0 encryption required"));
        assert!(!requires_starttls(550, "mailbox unavailable"));
    }
}
