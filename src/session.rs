//! Link session: the one owner of an open device channel.
//!
//! A [`LinkSession`] drives the connection state machine
//! (Disconnected → Connecting → Connected / Failed), owns the write half of
//! the serial stream, and spawns exactly one reader task per connection.
//! The reader drains incoming bytes, splits them into lines, and applies
//! decoded reports to the shared [`DeviceState`]; the consumer observes
//! everything through watch channels and the [`EventLog`], never by sharing
//! memory with the reader.
//!
//! # Error policy
//!
//! Failures on an open channel never surface as `Err` to the caller: a
//! write or read error appends an ERROR log entry, tears the reader down,
//! and moves the state to `Failed`. Only state-machine misuse
//! (`NotConnected`, `AlreadyConnected`) and port-open failures come back as
//! errors.
//!
//! # Teardown
//!
//! Disconnect signals a cooperative stop flag and then awaits the reader's
//! `JoinHandle`, so the task is provably gone before the port handle drops.
//! A read that completes concurrently with the stop signal re-checks the
//! flag before forwarding its line, so a byte pending at disconnect time
//! cannot produce a post-disconnect event.

use crate::config::LinkSettings;
use crate::error::{LinkError, LinkResult};
use crate::event_log::{Direction, EventLog, LogEntry};
use crate::protocol::{self, Command, DeviceLine};
use crate::state::{ConnectionState, DeviceState};
use crate::transport::{DynSerial, PortOpener, SerialOpener};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// Handle to one device over a line-oriented serial channel.
///
/// Plain owned data with no ambient global: create it at startup, hand it to
/// whatever drives the UI, drop it on shutdown. All state-mutating
/// operations serialize on one internal mutex, so a `send` can never race a
/// `disconnect` in progress.
pub struct LinkSession {
    opener: Box<dyn PortOpener>,
    settings: LinkSettings,
    log: EventLog,
    conn_tx: Arc<watch::Sender<ConnectionState>>,
    device_tx: Arc<watch::Sender<DeviceState>>,
    active: Mutex<Option<ActiveLink>>,
}

/// Resources tied to one open connection.
struct ActiveLink {
    writer: WriteHalf<DynSerial>,
    stop_tx: watch::Sender<bool>,
    reader: JoinHandle<()>,
}

impl LinkSession {
    /// Session backed by real serial hardware.
    pub fn new(settings: LinkSettings) -> Self {
        Self::with_opener(Box::new(SerialOpener), settings)
    }

    /// Session backed by an arbitrary transport (mocks in tests).
    pub fn with_opener(opener: Box<dyn PortOpener>, settings: LinkSettings) -> Self {
        let (conn_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (device_tx, _) = watch::channel(DeviceState::default());
        Self {
            opener,
            settings,
            log: EventLog::new(),
            conn_tx: Arc::new(conn_tx),
            device_tx: Arc::new(device_tx),
            active: Mutex::new(None),
        }
    }

    /// Open the channel and bring the link up.
    ///
    /// Valid from `Disconnected` or `Failed`; any other state returns
    /// [`LinkError::AlreadyConnected`]. On success the state is `Connected`,
    /// the reader task is running, and one `INIT` has been sent. On open
    /// failure the state is `Failed` (with an ERROR log entry) and the call
    /// may simply be retried.
    pub async fn connect(&self, port: &str) -> LinkResult<()> {
        let mut active = self.active.lock().await;

        if !self.conn_tx.borrow().can_connect() {
            return Err(LinkError::AlreadyConnected);
        }

        // A reader left over from a Failed link must be fully stopped
        // before a new one may start.
        if let Some(stale) = active.take() {
            shutdown_link(stale).await;
        }

        self.conn_tx.send_replace(ConnectionState::Connecting);
        self.log
            .append(Direction::Info, format!("Connecting to {port}..."));

        let stream = match self.opener.open(port, &self.settings).await {
            Ok(stream) => stream,
            Err(e) => {
                self.log
                    .append(Direction::Error, format!("Connection failed: {e}"));
                self.conn_tx.send_replace(ConnectionState::Failed);
                return Err(e);
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let (stop_tx, stop_rx) = watch::channel(false);

        // Connected must be observable before any reader-sourced event.
        self.conn_tx.send_replace(ConnectionState::Connected);
        self.log
            .append(Direction::Info, format!("Connected to {port}"));
        tracing::info!("serial link up on {port}");

        let reader = tokio::spawn(reader_loop(
            read_half,
            stop_rx,
            self.log.clone(),
            Arc::clone(&self.device_tx),
            Arc::clone(&self.conn_tx),
            self.settings.idle_poll(),
        ));

        *active = Some(ActiveLink {
            writer: write_half,
            stop_tx,
            reader,
        });

        self.send_locked(&mut active, Command::Init).await
    }

    /// Tear the link down.
    ///
    /// Valid from `Connected` or `Failed`. Idempotent: calling it while
    /// already `Disconnected` is a silent no-op with no log entry. The
    /// last-known device state is retained but marked unconfirmed.
    pub async fn disconnect(&self) -> LinkResult<()> {
        let mut active = self.active.lock().await;

        if *self.conn_tx.borrow() == ConnectionState::Disconnected {
            return Ok(());
        }

        if let Some(link) = active.take() {
            shutdown_link(link).await;
        }

        self.conn_tx.send_replace(ConnectionState::Disconnected);
        self.device_tx.send_modify(|state| state.confirmed = false);
        self.log.append(Direction::Info, "Disconnected");
        tracing::info!("serial link closed");
        Ok(())
    }

    /// Write a command followed by the line terminator.
    ///
    /// Requires `Connected`. A successful write appends a TX log entry; an
    /// I/O failure appends an ERROR entry, stops the reader, moves the state
    /// to `Failed`, and still returns `Ok(())`: channel errors are reported
    /// through the log, never thrown at the caller.
    pub async fn send(&self, command: Command) -> LinkResult<()> {
        let mut active = self.active.lock().await;
        self.send_locked(&mut active, command).await
    }

    /// Handshake command, also issued automatically by [`connect`](Self::connect).
    pub async fn send_init(&self) -> LinkResult<()> {
        self.send(Command::Init).await
    }

    /// Ask the device to report its current blink interval.
    pub async fn request_speed(&self) -> LinkResult<()> {
        self.send(Command::GetSpeed).await
    }

    /// Request a new blink interval.
    ///
    /// Applies the optimistic local update (unconfirmed) before writing;
    /// the device's own `BLINK:` report later overwrites authoritatively.
    /// The interval is encoded verbatim; bounds checking against
    /// [`protocol::BLINK_MIN_MS`]..=[`protocol::BLINK_MAX_MS`] belongs to
    /// the caller.
    pub async fn set_speed(&self, interval_ms: u32) -> LinkResult<()> {
        self.device_tx.send_modify(|state| {
            state.blink_interval_ms = interval_ms;
            state.confirmed = false;
        });
        self.send(Command::SetSpeed(interval_ms)).await
    }

    /// Send free-form command text.
    pub async fn send_raw(&self, text: impl Into<String>) -> LinkResult<()> {
        self.send(Command::Raw(text.into())).await
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.conn_tx.borrow()
    }

    /// Latest device state snapshot.
    pub fn device_state(&self) -> DeviceState {
        *self.device_tx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.conn_tx.subscribe()
    }

    /// Subscribe to device state changes.
    pub fn watch_device(&self) -> watch::Receiver<DeviceState> {
        self.device_tx.subscribe()
    }

    /// The session's event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Subscribe to log entries appended from now on.
    pub fn subscribe_log(&self) -> broadcast::Receiver<LogEntry> {
        self.log.subscribe()
    }

    async fn send_locked(
        &self,
        active: &mut Option<ActiveLink>,
        command: Command,
    ) -> LinkResult<()> {
        if *self.conn_tx.borrow() != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }

        let text = command.encode();
        let write_result = match active.as_mut() {
            None => return Err(LinkError::NotConnected),
            Some(link) => {
                let wire = format!("{text}\n");
                match link.writer.write_all(wire.as_bytes()).await {
                    Ok(()) => link.writer.flush().await,
                    Err(e) => Err(e),
                }
            }
        };

        match write_result {
            Ok(()) => {
                self.log.append(Direction::Tx, text);
                Ok(())
            }
            Err(e) => {
                self.log.append(Direction::Error, format!("TX error: {e}"));
                tracing::warn!("serial write failed: {e}");
                if let Some(link) = active.take() {
                    shutdown_link(link).await;
                }
                self.conn_tx.send_replace(ConnectionState::Failed);
                Ok(())
            }
        }
    }
}

/// Stop the reader cooperatively and wait for it to finish, then drop the
/// write half (closing the channel).
async fn shutdown_link(link: ActiveLink) {
    let _ = link.stop_tx.send(true);
    let _ = link.reader.await;
}

/// Background task: drain the read half line by line until stopped.
async fn reader_loop(
    read_half: ReadHalf<DynSerial>,
    mut stop: watch::Receiver<bool>,
    log: EventLog,
    device: Arc<watch::Sender<DeviceState>>,
    conn: Arc<watch::Sender<ConnectionState>>,
    idle_poll: Duration,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            result = reader.read_until(b'\n', &mut buf) => {
                // Re-check after a completed read: a line that raced the
                // stop signal must not be forwarded.
                if *stop.borrow() {
                    break;
                }
                match result {
                    // Channel closed; exit without further events.
                    Ok(0) => break,
                    Ok(_) => {
                        handle_frame(&buf, &log, &device);
                        buf.clear();
                    }
                    Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                        // No data; yield instead of busy-spinning.
                        tokio::time::sleep(idle_poll).await;
                    }
                    Err(e) => {
                        log.append(Direction::Error, format!("RX error: {e}"));
                        tracing::warn!("serial read failed: {e}");
                        conn.send_replace(ConnectionState::Failed);
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("reader task stopped");
}

/// Decode one raw frame and apply it.
///
/// Recognized in-range reports update the device state *before* the RX log
/// entry is appended, so a subscriber that wakes on the log entry already
/// sees the new state.
fn handle_frame(frame: &[u8], log: &EventLog, device: &watch::Sender<DeviceState>) {
    let Ok(text) = std::str::from_utf8(frame) else {
        log.append(Direction::Error, "Dropped undecodable bytes from device");
        return;
    };

    let line = text.trim_end();
    if line.is_empty() {
        return;
    }

    match protocol::decode_line(line) {
        DeviceLine::BlinkReport(interval_ms) if protocol::interval_in_range(interval_ms) => {
            device.send_modify(|state| {
                state.blink_interval_ms = interval_ms;
                state.confirmed = true;
            });
            log.append(Direction::Rx, line);
        }
        // Out-of-range reports and opaque text are logged with no state
        // effect; the protocol has no way to request a re-send.
        _ => log.append(Direction::Rx, line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockOpener;

    fn mock_session() -> (LinkSession, tokio::io::DuplexStream) {
        let (host, device) = tokio::io::duplex(256);
        let session =
            LinkSession::with_opener(Box::new(MockOpener::new(Box::new(device))), LinkSettings::default());
        (session, host)
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let (session, _host) = mock_session();
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(session.log().is_empty());
    }

    #[tokio::test]
    async fn send_while_disconnected_is_rejected() {
        let (session, _host) = mock_session();
        let result = session.send(Command::GetSpeed).await;
        assert!(matches!(result, Err(LinkError::NotConnected)));
        // Rejection is a caller error, not a link event.
        assert!(session.log().is_empty());
    }

    #[tokio::test]
    async fn failed_connect_is_retryable() {
        let (host, device) = tokio::io::duplex(256);
        let opener = MockOpener::new(Box::new(device));
        opener.trigger_failure();
        let session = LinkSession::with_opener(Box::new(opener), LinkSettings::default());

        assert!(session.connect("mock0").await.is_err());
        assert_eq!(session.connection_state(), ConnectionState::Failed);
        let errors: Vec<_> = session
            .log()
            .snapshot()
            .into_iter()
            .filter(|e| e.direction == Direction::Error)
            .collect();
        assert_eq!(errors.len(), 1);

        // Failed is equivalent to Disconnected for the next attempt.
        session.connect("mock0").await.unwrap();
        assert_eq!(session.connection_state(), ConnectionState::Connected);
        drop(host);
    }

    #[tokio::test]
    async fn handle_frame_ignores_blank_lines() {
        let log = EventLog::new();
        let (device, _) = watch::channel(DeviceState::default());
        handle_frame(b"\r\n", &log, &device);
        handle_frame(b"\n", &log, &device);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn handle_frame_drops_invalid_utf8() {
        let log = EventLog::new();
        let (device, _) = watch::channel(DeviceState::default());
        handle_frame(&[0xff, 0xfe, b'\n'], &log, &device);

        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].direction, Direction::Error);
        assert!(!device.borrow().confirmed);
    }
}
