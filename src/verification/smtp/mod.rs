//! SMTP handshake probing: transient sessions that observe a server's
//! recipient-acceptance response without ever sending message data.

mod client;
mod error;
mod outcome;

pub use client::{test_smtp_connectivity, SmtpProber};
