//! Mock collaborators for tests and the host simulator.

use ivmon_traits::{
    Button, ButtonPad, Buzzer, BuzzerPattern, Channel, DisplaySurface, EdgeSource, Key, Keypad,
    LedState, StatusLeds, Transport,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory transport with togglable reachability and a send log.
#[derive(Debug)]
pub struct MockTransport {
    online: Arc<AtomicBool>,
    probes: Arc<AtomicU64>,
    fail_send: bool,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn online() -> Self {
        Self::with_state(true, false)
    }

    pub fn offline() -> Self {
        Self::with_state(false, false)
    }

    /// Reachable, but every send fails.
    pub fn failing_send() -> Self {
        Self::with_state(true, true)
    }

    fn with_state(online: bool, fail_send: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
            probes: Arc::new(AtomicU64::new(0)),
            fail_send,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the messages delivered so far. Keep a clone
    /// before moving the transport onto the uplink worker.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    /// Shared reachability-probe counter.
    pub fn probe_count(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.probes)
    }

    /// Shared flag controlling reachability, togglable mid-test.
    pub fn online_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.online)
    }
}

impl Transport for MockTransport {
    fn link_up(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.online.load(Ordering::SeqCst))
    }

    fn reachable(
        &mut self,
        _timeout: Duration,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.online.load(Ordering::SeqCst))
    }

    fn send(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_send {
            return Err("transport down".into());
        }
        if let Ok(mut log) = self.sent.lock() {
            log.push(message.to_owned());
        }
        Ok(())
    }
}

/// Display surface that keeps the current screen contents.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    lines: [String; 4],
    pub clears: usize,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self, row: usize) -> &str {
        &self.lines[row]
    }
}

impl DisplaySurface for RecordingDisplay {
    fn write_line(&mut self, row: u8, text: &str) {
        if let Some(line) = self.lines.get_mut(usize::from(row)) {
            *line = text.to_owned();
        }
    }

    fn clear(&mut self) {
        self.lines = Default::default();
        self.clears += 1;
    }
}

/// LED bank recording every state change.
#[derive(Debug, Default)]
pub struct RecordingLeds {
    pub history: Vec<LedState>,
}

impl RecordingLeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<LedState> {
        self.history.last().copied()
    }
}

impl StatusLeds for RecordingLeds {
    fn set(&mut self, state: LedState) {
        if self.history.last() != Some(&state) {
            self.history.push(state);
        }
    }
}

/// Buzzer recording every pattern change.
#[derive(Debug, Default)]
pub struct RecordingBuzzer {
    pub history: Vec<BuzzerPattern>,
}

impl RecordingBuzzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<BuzzerPattern> {
        self.history.last().copied()
    }
}

impl Buzzer for RecordingBuzzer {
    fn set_pattern(&mut self, pattern: BuzzerPattern) {
        if self.history.last() != Some(&pattern) {
            self.history.push(pattern);
        }
    }
}

/// Keypad that replays a scripted key sequence.
#[derive(Debug, Default)]
pub struct ScriptedKeypad {
    queue: VecDeque<Key>,
}

impl ScriptedKeypad {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            queue: keys.into_iter().collect(),
        }
    }

    pub fn push(&mut self, key: Key) {
        self.queue.push_back(key);
    }
}

impl Keypad for ScriptedKeypad {
    fn next_key(&mut self) -> Option<Key> {
        self.queue.pop_front()
    }
}

/// Button pad with externally settable levels, shared with the test body
/// through an [`Arc`] so presses can be injected while the session owns
/// the pad.
#[derive(Debug, Default)]
pub struct TestButtons {
    levels: Arc<[AtomicBool; 4]>,
}

/// Test-side handle for driving [`TestButtons`].
#[derive(Debug, Clone)]
pub struct TestButtonsHandle {
    levels: Arc<[AtomicBool; 4]>,
}

impl TestButtons {
    pub fn new() -> (Self, TestButtonsHandle) {
        let levels: Arc<[AtomicBool; 4]> = Arc::new(Default::default());
        (
            Self {
                levels: Arc::clone(&levels),
            },
            TestButtonsHandle { levels },
        )
    }
}

impl TestButtonsHandle {
    pub fn press(&self, button: Button) {
        self.levels[button.index()].store(true, Ordering::SeqCst);
    }

    pub fn release(&self, button: Button) {
        self.levels[button.index()].store(false, Ordering::SeqCst);
    }
}

impl ButtonPad for TestButtons {
    fn level(&mut self, button: Button) -> bool {
        self.levels[button.index()].load(Ordering::SeqCst)
    }
}

/// Edge source that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEdges;

impl EdgeSource for NoopEdges {
    fn take_edge(&mut self, _channel: Channel) -> Option<u64> {
        None
    }

    fn take_fault(&mut self) -> Option<String> {
        None
    }
}
