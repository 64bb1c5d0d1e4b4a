//! Shared test fixtures: a scripted in-process SMTP server and a static
//! DNS lookup, so the full engine can run without touching the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use email_scout_core::{MxHost, MxLookup, Result};

/// Installs a fmt subscriber once so `RUST_LOG` works in test runs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// How the mock server answers `RCPT TO` commands.
#[derive(Clone)]
pub struct SmtpScript {
    /// Response for addresses without a specific entry.
    pub default_rcpt: (u16, String),
    /// Per-address responses, keyed by the full lower-cased address.
    pub rcpt_responses: HashMap<String, (u16, String)>,
    /// Accept connections but never write a byte, to exercise timeouts.
    pub silent: bool,
}

impl SmtpScript {
    /// Rejects every recipient as unknown.
    pub fn reject_all() -> Self {
        Self {
            default_rcpt: (550, "5.1.1 user unknown".to_string()),
            rcpt_responses: HashMap::new(),
            silent: false,
        }
    }

    /// Accepts every recipient, catch-all style.
    pub fn accept_all() -> Self {
        Self {
            default_rcpt: (250, "2.1.5 recipient ok".to_string()),
            rcpt_responses: HashMap::new(),
            silent: false,
        }
    }

    /// Greylists every recipient with a transient failure.
    pub fn greylist_all() -> Self {
        Self {
            default_rcpt: (451, "4.7.1 greylisted, try again later".to_string()),
            rcpt_responses: HashMap::new(),
            silent: false,
        }
    }

    /// Never speaks on the wire.
    pub fn silent() -> Self {
        Self {
            default_rcpt: (550, "unused".to_string()),
            rcpt_responses: HashMap::new(),
            silent: true,
        }
    }

    pub fn with_rcpt(mut self, address: &str, code: u16, message: &str) -> Self {
        self.rcpt_responses
            .insert(address.to_lowercase(), (code, message.to_string()));
        self
    }
}

/// A minimal SMTP server speaking just enough of the protocol for
/// handshake probes: banner, EHLO/HELO, MAIL, RCPT, RSET, QUIT.
pub struct MockSmtpServer {
    pub addr: SocketAddr,
    /// Every address the server saw in an `RCPT TO`, in arrival order.
    pub rcpt_log: Arc<Mutex<Vec<String>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockSmtpServer {
    pub async fn spawn(script: SmtpScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock SMTP listener");
        let addr = listener.local_addr().expect("local addr");
        let rcpt_log = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&rcpt_log);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(serve_session(stream, script.clone(), Arc::clone(&log)));
            }
        });

        Self {
            addr,
            rcpt_log,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Addresses from the log that look like synthetic catch-all probes.
    pub fn synthetic_probes(&self) -> usize {
        self.rcpt_log
            .lock()
            .iter()
            .filter(|a| a.starts_with("no-reply-does-not-exist-"))
            .count()
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_session(stream: TcpStream, script: SmtpScript, log: Arc<Mutex<Vec<String>>>) {
    if script.silent {
        // Hold the socket open without ever greeting the client.
        tokio::time::sleep(Duration::from_secs(60)).await;
        return;
    }

    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    if write_half
        .write_all(b"220 mock.test ESMTP ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let upper = line.to_uppercase();
        let reply = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            "250-mock.test greets you\r\n250 OK\r\n".to_string()
        } else if upper.starts_with("MAIL FROM") {
            "250 2.1.0 sender ok\r\n".to_string()
        } else if upper.starts_with("RCPT TO") {
            let address = extract_address(&line);
            log.lock().push(address.clone());
            let (code, message) = script
                .rcpt_responses
                .get(&address)
                .cloned()
                .unwrap_or_else(|| script.default_rcpt.clone());
            format!("{code} {message}\r\n")
        } else if upper.starts_with("RSET") || upper.starts_with("NOOP") {
            "250 OK\r\n".to_string()
        } else if upper.starts_with("QUIT") {
            let _ = write_half.write_all(b"221 2.0.0 bye\r\n").await;
            return;
        } else {
            "502 5.5.2 command not implemented\r\n".to_string()
        };

        if write_half.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn extract_address(line: &str) -> String {
    line.split('<')
        .nth(1)
        .and_then(|rest| rest.split('>').next())
        .unwrap_or("")
        .to_lowercase()
}

/// DNS facility answering from fixed tables.
pub struct StaticLookup {
    pub mx: HashMap<String, Vec<MxHost>>,
    pub hosts_with_addr: Vec<String>,
}

impl StaticLookup {
    /// Routes `domain` to the loopback host, where a mock server listens.
    pub fn loopback(domain: &str) -> Arc<Self> {
        let mut mx = HashMap::new();
        mx.insert(
            domain.to_string(),
            vec![MxHost::new(10, "127.0.0.1")],
        );
        Arc::new(Self {
            mx,
            hosts_with_addr: Vec::new(),
        })
    }

    /// Knows nothing: every resolution dead-ends.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            mx: HashMap::new(),
            hosts_with_addr: Vec::new(),
        })
    }
}

impl MxLookup for StaticLookup {
    fn lookup_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<Vec<MxHost>>> {
        async move { Ok(self.mx.get(domain).cloned().unwrap_or_default()) }.boxed()
    }

    fn lookup_host<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<bool>> {
        async move { Ok(self.hosts_with_addr.iter().any(|h| h == domain)) }.boxed()
    }
}
