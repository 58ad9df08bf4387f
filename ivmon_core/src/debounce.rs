//! Pulse and button debouncing.
//!
//! Sensor pulses: an edge is accepted only if at least `debounce_ms` has
//! elapsed since the previously accepted pulse on the same channel.
//! Buttons: a longer stabilization window rejects contact bounce and a
//! press is reported once per stable rising edge.

use ivmon_traits::Button;

/// Per-channel pulse debouncer. One instance per sensor channel; no
/// crosstalk between channels.
#[derive(Debug, Clone, Copy)]
pub struct PulseDebouncer {
    debounce_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl PulseDebouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            last_accepted_ms: None,
        }
    }

    /// Accept or discard an edge at `ts_ms`. Accepted edges update the
    /// channel's last-accepted time.
    pub fn accept(&mut self, ts_ms: u64) -> bool {
        match self.last_accepted_ms {
            Some(last) if ts_ms.saturating_sub(last) < self.debounce_ms => false,
            _ => {
                self.last_accepted_ms = Some(ts_ms);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_accepted_ms = None;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonState {
    last_level: bool,
    stable_level: bool,
    last_change_ms: u64,
}

/// Debouncer for the four operator buttons. Reports a press exactly once
/// per stable low-to-high transition.
#[derive(Debug)]
pub struct ButtonDebouncer {
    window_ms: u64,
    states: [ButtonState; 4],
}

impl ButtonDebouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            states: [ButtonState::default(); 4],
        }
    }

    /// Feed the raw level for `button` at `now_ms`; returns true on a
    /// debounced rising edge.
    pub fn pressed(&mut self, button: Button, level: bool, now_ms: u64) -> bool {
        let s = &mut self.states[button.index()];
        if level != s.last_level {
            s.last_level = level;
            s.last_change_ms = now_ms;
        }
        if now_ms.saturating_sub(s.last_change_ms) > self.window_ms && level != s.stable_level {
            s.stable_level = level;
            return level;
        }
        false
    }
}
