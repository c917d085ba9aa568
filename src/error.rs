//! Custom error types for the link.
//!
//! `LinkError` covers the failures a caller can meaningfully react to.
//! Everything that happens on an already-open channel (read/write failures,
//! undecodable lines) is deliberately *not* propagated as an error to the
//! caller: per the link's error policy those surface as ERROR entries in the
//! [`EventLog`](crate::event_log::EventLog) plus a transition to
//! [`ConnectionState::Failed`](crate::state::ConnectionState::Failed).

use thiserror::Error;

/// Convenience alias for results using the link error type.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to open serial port '{port}'")]
    Open {
        port: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port not connected")]
    NotConnected,

    #[error("A connection is already active")]
    AlreadyConnected,

    #[error("Serial support not enabled. Rebuild with --features serial")]
    SerialFeatureDisabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_keeps_port_name_in_message() {
        let err = LinkError::Open {
            port: "/dev/ttyUSB0".to_string(),
            source: anyhow::anyhow!("permission denied"),
        };
        assert!(err.to_string().contains("/dev/ttyUSB0"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: LinkError = io.into();
        assert!(matches!(err, LinkError::Io(_)));
    }
}
