//! Ordered, timestamped record of link traffic for display.
//!
//! Every inbound line, outbound command, and diagnostic lands here as a
//! [`LogEntry`]. Appending is O(1) and never blocks beyond a short mutex
//! hold, so logging can never become a source of backpressure on the reader
//! task. Consumers either take a [`snapshot`](EventLog::snapshot) or
//! subscribe to the broadcast feed; the feed is best-effort (a lagging
//! subscriber misses entries), the stored log is not.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Broadcast capacity for live log subscribers.
const SUBSCRIBER_BUFFER: usize = 256;

/// Direction or kind of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host-to-device command.
    Tx,
    /// Device-to-host line.
    Rx,
    /// Link lifecycle information.
    Info,
    /// A failure surfaced through the log channel.
    Error,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::Tx => "TX",
            Direction::Rx => "RX",
            Direction::Info => "INFO",
            Direction::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Represents a single log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    pub text: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.direction,
            self.text
        )
    }
}

/// A thread-safe, append-only event log with broadcast fan-out.
///
/// Insertion order is chronological order. The log itself is unbounded;
/// truncation for display is the consumer's business.
#[derive(Clone)]
pub struct EventLog {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    feed: broadcast::Sender<LogEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            feed,
        }
    }

    /// Append an entry. Never fails; subscribers that have gone away or
    /// lagged behind are ignored.
    pub fn append(&self, direction: Direction, text: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            direction,
            text: text.into(),
        };

        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry.clone());
        }
        let _ = self.feed.send(entry);
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset the stored log to empty. Live subscribers are unaffected.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Subscribe to entries appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let log = EventLog::new();
        log.append(Direction::Info, "first");
        log.append(Direction::Tx, "second");
        log.append(Direction::Rx, "third");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].text, "second");
        assert_eq!(entries[2].text, "third");
        assert_eq!(entries[1].direction, Direction::Tx);
    }

    #[test]
    fn clear_resets_to_empty() {
        let log = EventLog::new();
        log.append(Direction::Info, "entry");
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
        assert!(log.snapshot().is_empty());
    }

    #[tokio::test]
    async fn subscribers_receive_appended_entries() {
        let log = EventLog::new();
        let mut feed = log.subscribe();

        log.append(Direction::Rx, "BLINK:500");

        let entry = feed.recv().await.unwrap();
        assert_eq!(entry.direction, Direction::Rx);
        assert_eq!(entry.text, "BLINK:500");
    }

    #[test]
    fn append_without_subscribers_is_fine() {
        let log = EventLog::new();
        log.append(Direction::Error, "nobody listening");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn direction_labels() {
        assert_eq!(Direction::Tx.to_string(), "TX");
        assert_eq!(Direction::Rx.to_string(), "RX");
        assert_eq!(Direction::Info.to_string(), "INFO");
        assert_eq!(Direction::Error.to_string(), "ERROR");
    }
}
