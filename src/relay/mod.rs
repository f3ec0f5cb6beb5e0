// src/relay/mod.rs

//! Ordered hand-off of captured output lines.
//!
//! The reader task owns the [`LogPublisher`] and is the only producer; the
//! observer (a UI polling loop, the CLI runtime) owns the [`LogRelay`] and is
//! the only consumer. Publishing never waits on the consumer, and draining
//! never waits on the producer.
//!
//! Capacity is unbounded for the duration of one run. An observer that never
//! drains makes memory grow with the process's console output.

use std::sync::Mutex;

use tokio::sync::mpsc::{self, error::TryRecvError};

/// One captured line of process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Position in the handle's output, starting at 0 and gap-free.
    pub seq: u64,
    /// Line content without the trailing newline.
    pub text: String,
}

/// Producer half. Assigns sequence numbers.
#[derive(Debug)]
pub struct LogPublisher {
    tx: mpsc::UnboundedSender<LogLine>,
    next_seq: u64,
}

/// Consumer half.
#[derive(Debug)]
pub struct LogRelay {
    rx: Mutex<RelayRx>,
}

#[derive(Debug)]
struct RelayRx {
    rx: mpsc::UnboundedReceiver<LogLine>,
    closed: bool,
}

/// Create a connected publisher/relay pair.
pub fn log_relay() -> (LogPublisher, LogRelay) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        LogPublisher { tx, next_seq: 0 },
        LogRelay {
            rx: Mutex::new(RelayRx { rx, closed: false }),
        },
    )
}

impl LogPublisher {
    /// Publish a line and return the sequence number it was given.
    ///
    /// If the relay has been dropped the line is discarded; the sequence
    /// counter still advances so numbering stays consistent with what the
    /// process wrote.
    pub fn publish(&mut self, text: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let _ = self.tx.send(LogLine {
            seq,
            text: text.into(),
        });
        seq
    }

    /// Number of lines published so far.
    pub fn published(&self) -> u64 {
        self.next_seq
    }
}

impl LogRelay {
    /// Return every buffered line in sequence order. Never blocks; returns
    /// an empty vector when nothing new arrived since the last call.
    pub fn drain(&self) -> Vec<LogLine> {
        let mut guard = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::new();
        loop {
            match guard.rx.try_recv() {
                Ok(line) => out.push(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    guard.closed = true;
                    break;
                }
            }
        }
        out
    }

    /// True once the publisher is gone and every line has been drained.
    pub fn is_finished(&self) -> bool {
        let guard = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        guard.closed || (guard.rx.is_closed() && guard.rx.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_lines_in_order_then_empty() {
        let (mut publisher, relay) = log_relay();
        publisher.publish("a");
        publisher.publish("b");

        let lines = relay.drain();
        assert_eq!(
            lines,
            vec![
                LogLine { seq: 0, text: "a".into() },
                LogLine { seq: 1, text: "b".into() },
            ]
        );
        assert!(relay.drain().is_empty());
    }

    #[test]
    fn sequence_continues_across_drains() {
        let (mut publisher, relay) = log_relay();
        publisher.publish("a");
        let _ = relay.drain();
        publisher.publish("b");
        assert_eq!(relay.drain()[0].seq, 1);
        assert_eq!(publisher.published(), 2);
    }

    #[test]
    fn finished_only_after_publisher_dropped_and_drained() {
        let (mut publisher, relay) = log_relay();
        publisher.publish("a");
        assert!(!relay.is_finished());
        drop(publisher);
        assert!(!relay.is_finished());
        assert_eq!(relay.drain().len(), 1);
        assert!(relay.is_finished());
    }

    #[test]
    fn publish_after_relay_dropped_does_not_panic() {
        let (mut publisher, relay) = log_relay();
        drop(relay);
        assert_eq!(publisher.publish("lost"), 0);
        assert_eq!(publisher.publish("lost"), 1);
    }

    #[test]
    fn producer_on_other_thread_keeps_order() {
        let (mut publisher, relay) = log_relay();
        let producer = std::thread::spawn(move || {
            for i in 0..1000 {
                publisher.publish(format!("line {i}"));
            }
        });

        let mut seen = Vec::new();
        loop {
            seen.extend(relay.drain());
            if relay.is_finished() {
                break;
            }
            std::thread::yield_now();
        }
        producer.join().unwrap();

        let seqs: Vec<u64> = seen.iter().map(|l| l.seq).collect();
        assert_eq!(seqs, (0..1000).collect::<Vec<_>>());
    }
}
