//! Drop counting and derived delivery metrics.
//!
//! Each debounced drop pulse increments a running total and enters a
//! sliding window used for the measured-rate estimate. Volume figures are
//! derived, never stored: `delivered = drops / drip_factor`.

use crate::prescription::Prescription;
use std::collections::VecDeque;

/// Running drop total plus the sliding rate window.
#[derive(Debug)]
pub struct DropCounter {
    window_ms: u64,
    total_drops: u64,
    /// Timestamp of the last accepted drop; initialized to session start
    /// so the no-flow timer is armed before the first drop arrives.
    last_drop_ms: u64,
    window: VecDeque<u64>,
}

impl DropCounter {
    pub fn new(window_ms: u64, session_start_ms: u64) -> Self {
        Self {
            window_ms,
            total_drops: 0,
            last_drop_ms: session_start_ms,
            window: VecDeque::new(),
        }
    }

    /// Record an accepted drop at `ts_ms`.
    pub fn record(&mut self, ts_ms: u64) {
        self.total_drops += 1;
        self.last_drop_ms = ts_ms;
        self.window.push_back(ts_ms);
        self.evict(ts_ms);
    }

    /// Drop window entries older than the rate window. Called on every
    /// tick so the rate decays even when no new drops arrive.
    pub fn evict(&mut self, now_ms: u64) {
        while let Some(&front) = self.window.front() {
            if now_ms.saturating_sub(front) > self.window_ms {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Zero the counters and restart the no-flow timer at `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.total_drops = 0;
        self.last_drop_ms = now_ms;
        self.window.clear();
    }

    pub fn total_drops(&self) -> u64 {
        self.total_drops
    }

    /// Milliseconds of silence on the drop channel.
    pub fn ms_since_last_drop(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_drop_ms)
    }

    /// Drops seen within the sliding window, i.e. the measured gtt/min
    /// when the window is one minute.
    pub fn drops_in_window(&self) -> usize {
        self.window.len()
    }

    /// Snapshot of all derived figures for one tick.
    pub fn metrics(&self, prescription: &Prescription, now_ms: u64) -> DropMetrics {
        let drip = prescription.drip_factor().max(1) as f32;
        let delivered_ml = self.total_drops as f32 / drip;
        let target = prescription.target_volume_ml() as f32;
        let remaining_ml = (target - delivered_ml).max(0.0);
        let percent = if target > 0.0 {
            (delivered_ml / target * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let rate_gtt_min = self.window.len() as f32;
        let rate_ml_hr = rate_gtt_min * 60.0 / drip;
        let eta_hours = if rate_ml_hr > 0.0 {
            Some(remaining_ml / rate_ml_hr)
        } else {
            None
        };
        DropMetrics {
            delivered_ml,
            remaining_ml,
            percent,
            rate_gtt_min,
            rate_ml_hr,
            eta_hours,
            ms_since_last_drop: self.ms_since_last_drop(now_ms),
        }
    }
}

/// Derived delivery figures for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropMetrics {
    pub delivered_ml: f32,
    pub remaining_ml: f32,
    /// Completion percentage, clamped to `0.0..=100.0`.
    pub percent: f32,
    /// Measured rate in drops per minute (window occupancy).
    pub rate_gtt_min: f32,
    /// Measured rate in mL per hour.
    pub rate_ml_hr: f32,
    /// Hours to completion at the measured rate; `None` while no flow.
    pub eta_hours: Option<f32>,
    pub ms_since_last_drop: u64,
}
