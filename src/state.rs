//! Shared connection and device state.
//!
//! Both types are published through `tokio::sync::watch` channels owned by
//! the [`LinkSession`](crate::session::LinkSession), so the consumer and the
//! reader task never touch the same memory directly: writers publish, and
//! any number of subscribers observe the latest value.

use serde::{Deserialize, Serialize};

/// Lifecycle of the one link session.
///
/// `Failed` is equivalent to `Disconnected` for the purpose of a subsequent
/// connect attempt; it exists so consumers can distinguish "user closed the
/// link" from "the link died under us".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// True when a new connect attempt may start.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

/// Best-effort view of the device-reported configuration.
///
/// `blink_interval_ms` is only meaningful while connected. It is kept across
/// a disconnect for display continuity, but `confirmed` drops to false until
/// a fresh `BLINK:` report arrives on a new connection. Optimistic local
/// updates (a host-issued set-speed) also leave `confirmed` false; only a
/// device report sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub blink_interval_ms: u32,
    pub confirmed: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            // Firmware default blink interval
            blink_interval_ms: 500,
            confirmed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectable_states() {
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Failed.can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::Connected.can_connect());
    }

    #[test]
    fn default_device_state_is_unconfirmed() {
        let state = DeviceState::default();
        assert_eq!(state.blink_interval_ms, 500);
        assert!(!state.confirmed);
    }
}
