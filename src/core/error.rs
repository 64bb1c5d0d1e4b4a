//! Defines the custom error types for the email-scout engine.

use std::{io, net::AddrParseError};
use thiserror::Error;

/// The primary error type for the email discovery process.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (e.g., resolvers).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error during DNS resolution.
    #[error("DNS Resolution Error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// Specific DNS error indicating the domain does not exist.
    #[error("Domain Not Found (NXDOMAIN): {0}")]
    NxDomain(String),

    /// Specific DNS error indicating no relevant records were found.
    #[error("No DNS Records Found (MX/A): {0}")]
    NoDnsRecords(String),

    /// DNS operation timed out.
    #[error("DNS Timeout for domain: {0}")]
    DnsTimeout(String),

    /// Error during SMTP communication setup or command execution.
    #[error("SMTP Error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// SMTP verification was inconclusive (e.g., catch-all, timeout).
    #[error("SMTP Inconclusive: {0}")]
    SmtpInconclusive(String),

    /// Error parsing an IP address or socket address.
    #[error("Address Parsing Error: {0}")]
    AddrParse(#[from] AddrParseError),

    /// Error related to concurrency or task execution.
    #[error("Task Execution Error: {0}")]
    Task(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
