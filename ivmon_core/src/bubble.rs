//! Dual-sensor bubble confirmation.
//!
//! A bubble alarm is raised only when the IR sensor and the slot sensor
//! both report within the confirmation window. A pulse on a single
//! channel is held until it ages past the window, then discarded, so an
//! electrical glitch on one sensor never raises the alarm.

/// Confirmation state across the two bubble channels.
#[derive(Debug)]
pub struct BubbleDetector {
    window_ms: u64,
    pending_ir: Option<u64>,
    pending_slot: Option<u64>,
    active: bool,
    acknowledged: bool,
}

impl BubbleDetector {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            pending_ir: None,
            pending_slot: None,
            active: false,
            acknowledged: false,
        }
    }

    /// Debounced pulse from the IR bubble sensor.
    pub fn trigger_ir(&mut self, ts_ms: u64) {
        self.pending_ir = Some(ts_ms);
    }

    /// Debounced pulse from the slot bubble sensor.
    pub fn trigger_slot(&mut self, ts_ms: u64) {
        self.pending_slot = Some(ts_ms);
    }

    /// Advance the detector one tick. Returns true when a confirmation
    /// newly latches (or re-latches after an acknowledgement), which is
    /// the moment the alarm should sound.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let confirmed = match (self.pending_ir, self.pending_slot) {
            (Some(ir), Some(slot)) if ir.abs_diff(slot) <= self.window_ms => {
                self.pending_ir = None;
                self.pending_slot = None;
                true
            }
            _ => false,
        };

        // A lone pulse past the window is noise.
        if self.pending_ir.is_some_and(|t| now_ms.saturating_sub(t) > self.window_ms) {
            self.pending_ir = None;
        }
        if self.pending_slot.is_some_and(|t| now_ms.saturating_sub(t) > self.window_ms) {
            self.pending_slot = None;
        }

        if confirmed {
            let newly = !self.active || self.acknowledged;
            self.active = true;
            self.acknowledged = false;
            return newly;
        }
        // An acknowledged alarm clears once confirmations stop.
        if self.active && self.acknowledged {
            self.active = false;
            self.acknowledged = false;
        }
        false
    }

    /// The operator acknowledged the alarm; it clears on the next quiet
    /// poll but re-latches if the bubble is confirmed again.
    pub fn acknowledge(&mut self) {
        if self.active {
            self.acknowledged = true;
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn reset(&mut self) {
        self.pending_ir = None;
        self.pending_slot = None;
        self.active = false;
        self.acknowledged = false;
    }
}
