//! Hardware-seam traits for the IV infusion monitor.
//!
//! Everything the session core needs from the outside world goes through
//! these traits: debounced-edge capture, operator buttons, the numeric
//! keypad, the character display, status LEDs, the buzzer, and the
//! outbound-message transport. Concrete drivers live outside this
//! workspace; tests and the simulator provide mock implementations.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Sensor input channels monitored by the session core.
///
/// Each channel has independent debounce state; there is no crosstalk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Drop IR sensor (one pulse per falling drop).
    Drop,
    /// Bubble IR sensor (first half of the dual confirmation).
    BubbleIr,
    /// Bubble slot module (second half of the dual confirmation).
    BubbleSlot,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Drop, Channel::BubbleIr, Channel::BubbleSlot];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Channel::Drop => 0,
            Channel::BubbleIr => 1,
            Channel::BubbleSlot => 2,
        }
    }
}

/// Operator buttons. Semantics are uniform across session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Silence the buzzer for the currently active alarm.
    Ack,
    /// Full reset: discard prescription, counters, and flags.
    New,
    /// Counters-only reset: keep the prescription.
    Cal,
    /// Immediate safe shutdown.
    Term,
}

impl Button {
    pub const ALL: [Button; 4] = [Button::Ack, Button::New, Button::Cal, Button::Term];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Button::Ack => 0,
            Button::New => 1,
            Button::Cal => 2,
            Button::Term => 3,
        }
    }
}

/// A key reported by the matrix-keypad driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// 0-9.
    Digit(u8),
    /// `*`: backspace, or "use default" where a default exists.
    Star,
    /// `#`: confirm the current entry.
    Hash,
}

/// Which status LED is lit. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    Off,
    Green,
    Yellow,
    Red,
}

/// Buzzer output requested by the alarm arbitrator. Pattern timing is
/// executed by the driver; the core only selects the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerPattern {
    Off,
    /// Toggle on/off every `interval_ms`.
    Pulse { interval_ms: u32 },
    /// Solid tone.
    Continuous,
}

/// Latched edge capture, read and cleared exactly once per tick.
///
/// The driver side records "a raw edge occurred on channel X at time T";
/// the session consumes the latched value with [`EdgeSource::take_edge`].
/// A value is returned at most once.
pub trait EdgeSource {
    /// Take the timestamp (ms on the session clock) of the last unread
    /// edge on `channel`, clearing the latch.
    fn take_edge(&mut self, channel: Channel) -> Option<u64>;

    /// Take a pending sensor/driver fault report, if any. The session
    /// latches the fault; sources need not repeat it.
    fn take_fault(&mut self) -> Option<String>;
}

impl<E: EdgeSource + ?Sized> EdgeSource for Box<E> {
    fn take_edge(&mut self, channel: Channel) -> Option<u64> {
        (**self).take_edge(channel)
    }
    fn take_fault(&mut self) -> Option<String> {
        (**self).take_fault()
    }
}

/// Raw button levels. Debouncing (30 ms stabilization) is done by the core.
pub trait ButtonPad {
    /// Current raw level of `button` (true = pressed contact).
    fn level(&mut self, button: Button) -> bool;
}

/// "Next key or none" interface exposed by the matrix-keypad driver.
pub trait Keypad {
    fn next_key(&mut self) -> Option<Key>;
}

/// Fixed-format character display (20x4, no scrolling).
pub trait DisplaySurface {
    /// Write `text` starting at column 0 of `row`; the core always sends
    /// lines padded to the display width.
    fn write_line(&mut self, row: u8, text: &str);
    fn clear(&mut self);
}

/// Outbound-message transport plus its connectivity checks.
///
/// `Send` is required because the session runs the transport on a
/// dedicated uplink worker thread so that no transport call can stall
/// the monitoring tick beyond its bound.
pub trait Transport: Send {
    /// Link/association check (e.g. WiFi joined). Expected to be cheap.
    fn link_up(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Lightweight reachability request, bounded by `timeout`.
    fn reachable(
        &mut self,
        timeout: Duration,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Deliver one outbound message to all configured recipients.
    fn send(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Status LED bank (red/yellow/green).
pub trait StatusLeds {
    fn set(&mut self, state: LedState);
}

/// Alarm buzzer.
pub trait Buzzer {
    fn set_pattern(&mut self, pattern: BuzzerPattern);
}
