//! Mapping from the serde-facing `ivmon_config` schema to core config.

use crate::config::{
    DetectionCfg, DisplayCfg, NetworkCfg, NotifyCfg, PrescriptionLimits, SessionCfg, ThresholdCfg,
    TimingCfg,
};

impl From<&ivmon_config::Detection> for DetectionCfg {
    fn from(d: &ivmon_config::Detection) -> Self {
        Self {
            drop_debounce_ms: d.drop_debounce_ms,
            button_debounce_ms: d.button_debounce_ms,
            bubble_window_ms: d.bubble_window_ms,
            no_flow_timeout_ms: d.no_flow_timeout_s.saturating_mul(1000),
            rate_window_ms: d.rate_window_s.saturating_mul(1000),
        }
    }
}

impl From<&ivmon_config::Thresholds> for ThresholdCfg {
    fn from(t: &ivmon_config::Thresholds) -> Self {
        Self {
            low_volume_ml: t.low_volume_ml,
            warning_volume_ml: t.warning_volume_ml,
        }
    }
}

impl From<&ivmon_config::Network> for NetworkCfg {
    fn from(n: &ivmon_config::Network) -> Self {
        Self {
            recheck_ms: n.recheck_s.saturating_mul(1000),
            probe_timeout_ms: n.probe_timeout_ms,
            send_timeout_ms: n.send_timeout_ms,
        }
    }
}

impl From<&ivmon_config::Display> for DisplayCfg {
    fn from(d: &ivmon_config::Display) -> Self {
        Self {
            update_interval_ms: d.update_interval_ms,
            rate_display_ms: d.rate_display_s.saturating_mul(1000),
        }
    }
}

impl From<&ivmon_config::Timing> for TimingCfg {
    fn from(t: &ivmon_config::Timing) -> Self {
        Self { tick_ms: t.tick_ms }
    }
}

impl From<&ivmon_config::Notify> for NotifyCfg {
    fn from(n: &ivmon_config::Notify) -> Self {
        Self {
            mark_sent_when_offline: n.mark_sent_when_offline,
        }
    }
}

impl From<&ivmon_config::Prescription> for PrescriptionLimits {
    fn from(p: &ivmon_config::Prescription) -> Self {
        Self {
            min_volume_ml: p.min_volume_ml,
            max_volume_ml: p.max_volume_ml,
            min_duration_min: p.min_duration_min,
            max_duration_min: p.max_duration_min,
            default_drip_factor: p.default_drip_factor,
            max_drip_factor: p.max_drip_factor,
        }
    }
}

impl From<&ivmon_config::Config> for SessionCfg {
    fn from(c: &ivmon_config::Config) -> Self {
        Self {
            detection: (&c.detection).into(),
            thresholds: (&c.thresholds).into(),
            network: (&c.network).into(),
            display: (&c.display).into(),
            timing: (&c.timing).into(),
            notify: (&c.notify).into(),
            limits: (&c.prescription).into(),
        }
    }
}
