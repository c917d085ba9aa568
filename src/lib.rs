//! # Blink Link Core Library
//!
//! Host-side serial command link for the STM32 LED blink controller. The
//! crate encapsulates everything between a UI and the wire: discovering
//! ports, the connect/disconnect state machine, a background reader that
//! turns incoming bytes into decoded report lines, and the shared device
//! state and event log a display layer consumes. The UI itself (widgets,
//! window lifecycle, log rendering) lives elsewhere and talks only to
//! [`session::LinkSession`].
//!
//! ## Crate Structure
//!
//! - **`config`**: `Settings`/`LinkSettings` loaded from TOML, with firmware
//!   defaults (115200 baud, 1 s read timeout, 10 ms idle poll).
//! - **`error`**: the `LinkError` enum and `LinkResult` alias.
//! - **`event_log`**: append-only TX/RX/INFO/ERROR record with snapshot and
//!   broadcast subscription.
//! - **`ports`**: serial port enumeration.
//! - **`protocol`**: pure command encoder (`INIT`, `GET`, `BLINK=<n>`) and
//!   report-line decoder (`BLINK:<n>`).
//! - **`session`**: the `LinkSession` state machine and its reader task.
//! - **`state`**: `ConnectionState` and `DeviceState`, published via watch
//!   channels.
//! - **`transport`**: the `DynSerial` seam between the session and a real
//!   (`tokio-serial`) or mock (duplex-stream) channel.

pub mod config;
pub mod error;
pub mod event_log;
pub mod ports;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

pub use config::{LinkSettings, Settings};
pub use error::{LinkError, LinkResult};
pub use session::LinkSession;
pub use state::{ConnectionState, DeviceState};
