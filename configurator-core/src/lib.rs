//! Core library for the serial Wi-Fi configurator.
//! This crate drives a headless board's serial console: it runs one
//! command/response transaction at a time against the remote shell, scrapes
//! the reply into structured network status, and derives the portal QR code
//! for the resolved address. The UI layer (window, labels, tray icon) lives
//! elsewhere and talks to this crate through the traits in [`traits`].

pub mod config;
pub mod qr;
pub mod session;
pub mod status;
pub mod traits;
pub mod transaction;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A command was attempted with no open serial channel. No I/O happens.
    #[error("serial console is not connected")]
    NotConnected,

    /// Opening the named serial device failed (permission, not found, busy).
    #[error("failed to open serial device {port}: {source}")]
    OpenFailure {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// A transaction is already in flight on this session. The channel is
    /// single-reader, single-writer; commands must not overlap.
    #[error("another command is still running on the serial console")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
