//! Plain configuration structs consumed by the session core.
//!
//! Defaults hold the fixed system constants; the serde-facing schema lives
//! in `ivmon_config` and converts into these via `conversions`.

/// Sensor timing and detection windows.
#[derive(Debug, Clone, Copy)]
pub struct DetectionCfg {
    /// Minimum spacing between accepted pulses on one sensor channel.
    pub drop_debounce_ms: u64,
    /// Stabilization window for operator buttons.
    pub button_debounce_ms: u64,
    /// Dual bubble-sensor confirmation window.
    pub bubble_window_ms: u64,
    /// Silence on the drop channel signalling no-flow (or completion).
    pub no_flow_timeout_ms: u64,
    /// Sliding window for the measured-rate estimate.
    pub rate_window_ms: u64,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            drop_debounce_ms: 80,
            button_debounce_ms: 30,
            bubble_window_ms: 400,
            no_flow_timeout_ms: 30_000,
            rate_window_ms: 60_000,
        }
    }
}

/// Volume alert thresholds in milliliters.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCfg {
    pub low_volume_ml: f32,
    pub warning_volume_ml: f32,
}

impl Default for ThresholdCfg {
    fn default() -> Self {
        Self {
            low_volume_ml: 200.0,
            warning_volume_ml: 300.0,
        }
    }
}

/// Connectivity recheck cadence and uplink bounds.
#[derive(Debug, Clone, Copy)]
pub struct NetworkCfg {
    pub recheck_ms: u64,
    pub probe_timeout_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for NetworkCfg {
    fn default() -> Self {
        Self {
            recheck_ms: 60_000,
            probe_timeout_ms: 5_000,
            send_timeout_ms: 5_000,
        }
    }
}

/// Display refresh cadence and the summary-screen hold time.
#[derive(Debug, Clone, Copy)]
pub struct DisplayCfg {
    pub update_interval_ms: u64,
    pub rate_display_ms: u64,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            update_interval_ms: 500,
            rate_display_ms: 3_000,
        }
    }
}

/// Main loop tick period.
#[derive(Debug, Clone, Copy)]
pub struct TimingCfg {
    pub tick_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self { tick_ms: 200 }
    }
}

/// Notification policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyCfg {
    /// Mark one-shot flags even when offline, suppressing catch-up sends.
    /// Catch-up covers the kinds re-evaluated every cycle (milestones and
    /// alarm reports); the start announcement is attempted only once.
    pub mark_sent_when_offline: bool,
}

/// Prescription entry limits.
#[derive(Debug, Clone, Copy)]
pub struct PrescriptionLimits {
    pub min_volume_ml: u32,
    pub max_volume_ml: u32,
    pub min_duration_min: u32,
    pub max_duration_min: u32,
    pub default_drip_factor: u32,
    pub max_drip_factor: u32,
}

impl Default for PrescriptionLimits {
    fn default() -> Self {
        Self {
            min_volume_ml: 1,
            max_volume_ml: 1500,
            min_duration_min: 1,
            max_duration_min: 1440,
            default_drip_factor: 20,
            max_drip_factor: 100,
        }
    }
}

/// Bundle of everything the session needs, defaulting to the system constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCfg {
    pub detection: DetectionCfg,
    pub thresholds: ThresholdCfg,
    pub network: NetworkCfg,
    pub display: DisplayCfg,
    pub timing: TimingCfg,
    pub notify: NotifyCfg,
    pub limits: PrescriptionLimits,
}
