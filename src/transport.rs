//! Serial channel abstractions.
//!
//! The session never names a concrete port type: it works against
//! [`DynSerial`], a type-erased async byte stream. Real hardware comes from
//! [`SerialOpener`] (tokio-serial); tests hand a `tokio::io::duplex` end to
//! [`MockOpener`] and play the device side themselves.

use crate::config::LinkSettings;
use crate::error::{LinkError, LinkResult};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Trait alias for async serial port I/O.
///
/// Any `AsyncRead + AsyncWrite + Unpin + Send` type qualifies, which covers
/// `tokio_serial::SerialStream` for hardware and `tokio::io::DuplexStream`
/// for tests.
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed serial channel.
pub type DynSerial = Box<dyn SerialPortIO>;

/// Opens the raw channel behind a [`LinkSession`](crate::session::LinkSession).
///
/// One implementation per transport; the session owns a boxed opener so the
/// connect path is identical for hardware and mocks.
#[async_trait]
pub trait PortOpener: Send + Sync {
    async fn open(&self, port: &str, settings: &LinkSettings) -> LinkResult<DynSerial>;
}

/// Opener for real serial hardware, 8-N-1, no flow control.
#[derive(Debug, Default)]
pub struct SerialOpener;

#[cfg(feature = "serial")]
#[async_trait]
impl PortOpener for SerialOpener {
    async fn open(&self, port: &str, settings: &LinkSettings) -> LinkResult<DynSerial> {
        use anyhow::Context;
        use tokio_serial::SerialPortBuilderExt;

        let port_owned = port.to_string();
        let baud_rate = settings.baud_rate;
        let timeout = settings.read_timeout();

        // Port initialization can block; keep it off the async runtime.
        let stream = tokio::task::spawn_blocking(move || {
            tokio_serial::new(&port_owned, baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .timeout(timeout)
                .open_native_async()
                .with_context(|| format!("Failed to open serial port: {port_owned}"))
        })
        .await
        .map_err(|e| LinkError::Open {
            port: port.to_string(),
            source: anyhow::anyhow!("spawn_blocking for serial port opening failed: {e}"),
        })?
        .map_err(|source| LinkError::Open {
            port: port.to_string(),
            source,
        })?;

        Ok(Box::new(stream))
    }
}

#[cfg(not(feature = "serial"))]
#[async_trait]
impl PortOpener for SerialOpener {
    async fn open(&self, _port: &str, _settings: &LinkSettings) -> LinkResult<DynSerial> {
        Err(LinkError::SerialFeatureDisabled)
    }
}

/// Mock opener for testing without physical hardware.
///
/// Holds a pre-made stream (typically one end of `tokio::io::duplex`) that
/// the first `open` call hands out. Supports failure injection for
/// connect-error paths, and a second `open` fails because the stream has
/// already been consumed.
///
/// # Example
///
/// ```
/// use blink_link::config::LinkSettings;
/// use blink_link::transport::{MockOpener, PortOpener};
///
/// # tokio_test::block_on(async {
/// let (_host, device) = tokio::io::duplex(64);
/// let opener = MockOpener::new(Box::new(device));
/// assert!(opener.open("mock0", &LinkSettings::default()).await.is_ok());
/// # })
/// ```
pub struct MockOpener {
    stream: std::sync::Mutex<Option<DynSerial>>,
    fail_next: std::sync::atomic::AtomicBool,
}

impl MockOpener {
    /// Opener that yields `stream` on the first successful `open`.
    pub fn new(stream: DynSerial) -> Self {
        Self {
            stream: std::sync::Mutex::new(Some(stream)),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Opener with no stream at all; every `open` fails.
    pub fn empty() -> Self {
        Self {
            stream: std::sync::Mutex::new(None),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make the next `open` call fail even if a stream is available.
    pub fn trigger_failure(&self) {
        self.fail_next
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl PortOpener for MockOpener {
    async fn open(&self, port: &str, _settings: &LinkSettings) -> LinkResult<DynSerial> {
        if self
            .fail_next
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(LinkError::Open {
                port: port.to_string(),
                source: anyhow::anyhow!("Mock open failure"),
            });
        }

        self.stream
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| LinkError::Open {
                port: port.to_string(),
                source: anyhow::anyhow!("Mock opener has no stream left"),
            })
    }
}
