//! Error types shared by the codec, transport and controller layers.

use thiserror::Error;

/// Errors raised while encoding, decoding or exchanging OpenFlow messages.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or buffer I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffer ended before a structure it should contain.
    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    /// The peer speaks an OpenFlow version other than 0x01.
    #[error("unsupported OpenFlow version {0:#04x}")]
    UnsupportedVersion(u8),

    /// Header type code outside the OpenFlow 1.0 range.
    #[error("unknown OpenFlow message type {0}")]
    UnknownMessageType(u8),

    /// A field carried a value with no defined meaning.
    #[error("invalid {field} value {value:#x}")]
    InvalidField { field: &'static str, value: u32 },

    /// A port number in the reserved range that is not a known pseudo-port.
    #[error("unsupported port number {0:#06x}")]
    UnsupportedPort(u16),

    /// An action that cannot appear where it was used.
    #[error("invalid action: {0}")]
    InvalidAction(&'static str),

    /// The switch did not complete the HELLO / FEATURES exchange.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Fail with `Error::Truncated` unless `buf` holds at least `need` bytes.
pub(crate) fn ensure_len(what: &'static str, buf: &[u8], need: usize) -> Result<()> {
    if buf.len() < need {
        Err(Error::Truncated {
            what,
            need,
            have: buf.len(),
        })
    } else {
        Ok(())
    }
}
