//! Serial port enumeration.

use serde::Serialize;

/// A currently-available serial endpoint.
///
/// Descriptors are ephemeral: recompute them per enumeration call, never
/// persist them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    /// Platform identifier, e.g. "/dev/ttyUSB0" or "COM3".
    pub identifier: String,
}

/// List the serial ports the platform currently reports.
///
/// A pure query with no failure mode: enumeration problems are logged and
/// yield an empty list, and calling this on a refresh interval accumulates
/// no resources.
#[cfg(feature = "serial")]
pub fn list_ports() -> Vec<PortDescriptor> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| PortDescriptor {
                identifier: p.port_name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Could not enumerate serial ports: {e}");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "serial"))]
pub fn list_ports() -> Vec<PortDescriptor> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_is_repeatable() {
        // No assertion on contents (host-dependent), but repeated calls must
        // not panic or error.
        let first = list_ports();
        let second = list_ports();
        drop((first, second));
    }
}
