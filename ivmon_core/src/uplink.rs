//! Bounded-latency uplink worker.
//!
//! Network calls can stall far longer than one control tick, so the
//! transport is moved onto a dedicated worker thread and every exchange
//! with it is bounded by `recv_timeout`. A worker that does not answer
//! in time is treated as offline for that exchange; the control loop
//! never blocks past its deadline.

use crate::error::MonitorError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use ivmon_traits::Transport;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::warn;

enum Command {
    Probe { timeout: Duration },
    Send { message: String },
}

enum Reply {
    Probe(bool),
    Sent(Result<(), String>),
}

/// Handle to the worker thread that owns the transport.
pub struct Uplink {
    commands: Option<Sender<Command>>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
}

impl Uplink {
    /// Move `transport` onto a worker thread and return the handle.
    pub fn spawn(transport: Box<dyn Transport>) -> Self {
        let (cmd_tx, cmd_rx) = bounded::<Command>(1);
        let (reply_tx, reply_rx) = bounded::<Reply>(1);
        let handle = std::thread::spawn(move || worker(transport, &cmd_rx, &reply_tx));
        Self {
            commands: Some(cmd_tx),
            replies: reply_rx,
            handle: Some(handle),
        }
    }

    /// Check reachability within `timeout_ms`. Any failure, including a
    /// busy or unresponsive worker, reads as offline.
    pub fn probe(&self, timeout_ms: u64) -> bool {
        let timeout = Duration::from_millis(timeout_ms);
        match self.exchange(Command::Probe { timeout }, timeout) {
            Some(Reply::Probe(up)) => up,
            Some(Reply::Sent(_)) | None => false,
        }
    }

    /// Deliver one notification message within `timeout_ms`.
    pub fn send(&self, message: &str, timeout_ms: u64) -> Result<(), MonitorError> {
        let command = Command::Send {
            message: message.to_owned(),
        };
        match self.exchange(command, Duration::from_millis(timeout_ms)) {
            Some(Reply::Sent(Ok(()))) => Ok(()),
            Some(Reply::Sent(Err(e))) => Err(MonitorError::Transport(e)),
            Some(Reply::Probe(_)) => Err(MonitorError::State(
                "uplink worker answered out of order".into(),
            )),
            None => Err(MonitorError::Timeout),
        }
    }

    fn exchange(&self, command: Command, timeout: Duration) -> Option<Reply> {
        let commands = self.commands.as_ref()?;
        // A reply to an exchange we already gave up on may still be
        // queued; discard it so it cannot answer this command.
        while self.replies.try_recv().is_ok() {}
        match commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("uplink worker busy, treating exchange as failed");
                return None;
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("uplink worker gone");
                return None;
            }
        }
        // Small grace on top of the transport's own deadline so a
        // well-behaved worker is not cut off mid-reply.
        match self.replies.recv_timeout(timeout + Duration::from_millis(250)) {
            Ok(reply) => Some(reply),
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "uplink exchange timed out");
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Uplink {
    fn drop(&mut self) {
        // Closing the command channel lets the worker drain and exit.
        self.commands.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker(mut transport: Box<dyn Transport>, commands: &Receiver<Command>, replies: &Sender<Reply>) {
    while let Ok(command) = commands.recv() {
        let reply = match command {
            Command::Probe { timeout } => {
                let up = match transport.link_up() {
                    Ok(true) => transport.reachable(timeout).unwrap_or(false),
                    Ok(false) => false,
                    Err(e) => {
                        warn!(error = %e, "link check failed");
                        false
                    }
                };
                Reply::Probe(up)
            }
            Command::Send { message } => {
                Reply::Sent(transport.send(&message).map_err(|e| e.to_string()))
            }
        };
        // The caller may have timed out and walked away; never block on
        // the reply slot, or a slow transport wedges shutdown.
        match replies.try_send(reply) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTransport;

    #[test]
    fn probe_reports_reachability() {
        let uplink = Uplink::spawn(Box::new(MockTransport::online()));
        assert!(uplink.probe(1_000));
    }

    #[test]
    fn probe_fails_closed_when_offline() {
        let uplink = Uplink::spawn(Box::new(MockTransport::offline()));
        assert!(!uplink.probe(1_000));
    }

    #[test]
    fn send_delivers_and_records() {
        let transport = MockTransport::online();
        let sent = transport.sent_log();
        let uplink = Uplink::spawn(Box::new(transport));
        uplink.send("hello", 1_000).unwrap();
        drop(uplink);
        assert_eq!(sent.lock().unwrap().as_slice(), ["hello".to_owned()]);
    }

    #[test]
    fn send_surfaces_transport_error() {
        let uplink = Uplink::spawn(Box::new(MockTransport::failing_send()));
        assert!(matches!(
            uplink.send("hello", 1_000),
            Err(MonitorError::Transport(_))
        ));
    }

    struct HangingTransport;

    impl Transport for HangingTransport {
        fn link_up(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            Ok(true)
        }
        fn reachable(
            &mut self,
            _timeout: Duration,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            // Ignores its deadline entirely.
            std::thread::sleep(Duration::from_millis(600));
            Ok(true)
        }
        fn send(&mut self, _message: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            std::thread::sleep(Duration::from_millis(600));
            Ok(())
        }
    }

    #[test]
    fn hanging_transport_fails_closed_within_bound() {
        let uplink = Uplink::spawn(Box::new(HangingTransport));
        let start = std::time::Instant::now();
        assert!(!uplink.probe(100));
        assert!(start.elapsed() < Duration::from_millis(1_500));
        // The worker is still busy; a follow-up send fails fast too.
        assert!(uplink.send("hello", 100).is_err());
    }
}
