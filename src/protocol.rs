//! Wire protocol for the LED blink controller.
//!
//! The protocol is newline-terminated ASCII in both directions:
//!
//! - Host → device: `INIT`, `GET`, `BLINK=<interval ms>`
//! - Device → host: `BLINK:<interval ms>` reports; anything else is opaque
//!   text passed through to the log.
//!
//! Encoding and decoding are pure functions with no I/O. Extending the
//! protocol means adding a variant and a prefix rule here; the session and
//! reader code never inspect line contents themselves.

use std::fmt;

/// Smallest blink interval the firmware accepts, in milliseconds.
pub const BLINK_MIN_MS: u32 = 50;

/// Largest blink interval the firmware accepts, in milliseconds.
pub const BLINK_MAX_MS: u32 = 2_000;

/// A host-to-device command.
///
/// Commands are stateless and fire-and-forget; no correlation id ties a
/// command to a response. `SetSpeed` encodes whatever interval it is given:
/// validating against [`BLINK_MIN_MS`]..=[`BLINK_MAX_MS`] is the caller's
/// responsibility, matching the bounded control upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Handshake sent automatically after a successful connect.
    Init,
    /// Ask the device to report its current blink interval.
    GetSpeed,
    /// Request a new blink interval in milliseconds.
    SetSpeed(u32),
    /// Free-form command text, for test buttons and manual sends.
    Raw(String),
}

impl Command {
    /// Render the command as wire text, without the line terminator.
    pub fn encode(&self) -> String {
        match self {
            Command::Init => "INIT".to_string(),
            Command::GetSpeed => "GET".to_string(),
            Command::SetSpeed(interval_ms) => format!("BLINK={interval_ms}"),
            Command::Raw(text) => text.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A decoded device-to-host line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLine {
    /// `BLINK:<n>`, the device's current blink interval.
    BlinkReport(u32),
    /// Anything else, passed through verbatim.
    Text(String),
}

/// Decode one trimmed, non-empty device line.
///
/// A `BLINK:` prefix with an unparsable integer is *not* an error: the line
/// falls through to [`DeviceLine::Text`] and the state stays untouched. The
/// wire protocol offers no way to ask the device to re-send, so there is
/// nothing better to do with it than log it.
pub fn decode_line(line: &str) -> DeviceLine {
    if let Some(rest) = line.strip_prefix("BLINK:") {
        if let Ok(interval_ms) = rest.trim().parse::<u32>() {
            return DeviceLine::BlinkReport(interval_ms);
        }
    }
    DeviceLine::Text(line.to_string())
}

/// Whether a reported interval is within the firmware's accepted range.
pub fn interval_in_range(interval_ms: u32) -> bool {
    (BLINK_MIN_MS..=BLINK_MAX_MS).contains(&interval_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fixed_vocabulary() {
        assert_eq!(Command::Init.encode(), "INIT");
        assert_eq!(Command::GetSpeed.encode(), "GET");
        assert_eq!(Command::Raw("PING".into()).encode(), "PING");
    }

    #[test]
    fn set_speed_encodes_verbatim_across_range() {
        assert_eq!(Command::SetSpeed(BLINK_MIN_MS).encode(), "BLINK=50");
        assert_eq!(Command::SetSpeed(500).encode(), "BLINK=500");
        assert_eq!(Command::SetSpeed(BLINK_MAX_MS).encode(), "BLINK=2000");
        // The encoder does not clamp; out-of-range values pass through.
        assert_eq!(Command::SetSpeed(99_999).encode(), "BLINK=99999");
    }

    #[test]
    fn decodes_blink_report() {
        assert_eq!(decode_line("BLINK:750"), DeviceLine::BlinkReport(750));
        assert_eq!(decode_line("BLINK:50"), DeviceLine::BlinkReport(50));
    }

    #[test]
    fn malformed_report_falls_through_to_text() {
        assert_eq!(
            decode_line("BLINK:abc"),
            DeviceLine::Text("BLINK:abc".into())
        );
        assert_eq!(decode_line("BLINK:"), DeviceLine::Text("BLINK:".into()));
        assert_eq!(decode_line("BLINK:-5"), DeviceLine::Text("BLINK:-5".into()));
    }

    #[test]
    fn unrecognized_lines_are_opaque_text() {
        assert_eq!(
            decode_line("LED READY"),
            DeviceLine::Text("LED READY".into())
        );
        // Prefix must match exactly; lowercase is not a report.
        assert_eq!(
            decode_line("blink:100"),
            DeviceLine::Text("blink:100".into())
        );
    }

    #[test]
    fn range_check_matches_firmware_bounds() {
        assert!(interval_in_range(50));
        assert!(interval_in_range(2_000));
        assert!(!interval_in_range(49));
        assert!(!interval_in_range(2_001));
        assert!(!interval_in_range(99_999));
    }
}
