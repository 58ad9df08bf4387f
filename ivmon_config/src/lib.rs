#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and secrets loading for the IV monitoring system.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every field defaults to the fixed system constants, so an empty TOML
//!   document yields a fully usable configuration.
//! - `Secrets` (WiFi + SMS credentials) load from a separate JSON file so
//!   they never land in the checked-in config.
use serde::Deserialize;

/// Prescription entry limits and the default drip factor.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Prescription {
    pub min_volume_ml: u32,
    pub max_volume_ml: u32,
    pub min_duration_min: u32,
    pub max_duration_min: u32,
    /// gtt/mL used when the operator skips drip-factor entry.
    pub default_drip_factor: u32,
    pub max_drip_factor: u32,
}

impl Default for Prescription {
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

/// Sensor timing and detection windows.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Detection {
    /// Ignore pulses arriving faster than this on a sensor channel.
    pub drop_debounce_ms: u64,
    /// Stabilization window for operator buttons.
    pub button_debounce_ms: u64,
    /// Both bubble sensors must trigger within this window.
    pub bubble_window_ms: u64,
    /// Zero confirmed drops for this long signals no-flow (or completion).
    pub no_flow_timeout_s: u64,
    /// Sliding window for the measured-rate estimate.
    pub rate_window_s: u64,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            drop_debounce_ms: 80,
            button_debounce_ms: 30,
            bubble_window_ms: 400,
            no_flow_timeout_s: 30,
            rate_window_s: 60,
        }
    }
}

/// Volume alert thresholds.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Thresholds {
    pub low_volume_ml: f32,
    pub warning_volume_ml: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_volume_ml: 200.0,
            warning_volume_ml: 300.0,
        }
    }
}

/// Connectivity probe cadence and uplink bounds.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Network {
    pub recheck_s: u64,
    /// Hard bound on the association + reachability probe.
    pub probe_timeout_ms: u64,
    /// Hard bound on a single outbound send.
    pub send_timeout_ms: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            recheck_s: 60,
            probe_timeout_ms: 5_000,
            send_timeout_ms: 5_000,
        }
    }
}

/// Display geometry and refresh cadence.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Display {
    pub update_interval_ms: u64,
    /// How long the prescription summary screen is held before monitoring.
    pub rate_display_s: u64,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            update_interval_ms: 500,
            rate_display_s: 3,
        }
    }
}

/// Main loop timing.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timing {
    pub tick_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self { tick_ms: 200 }
    }
}

/// Notification policy knobs.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct Notify {
    /// When true, a milestone/alert occurring while offline marks its
    /// one-shot flag anyway, suppressing any catch-up send after
    /// reconnection. Default false: the flag stays unset so the message
    /// can still go out if connectivity returns while the condition holds.
    pub mark_sent_when_offline: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub prescription: Prescription,
    pub detection: Detection,
    pub thresholds: Thresholds,
    pub network: Network,
    pub display: Display,
    pub timing: Timing,
    pub notify: Notify,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Prescription limits
        if self.prescription.min_volume_ml == 0 {
            eyre::bail!("prescription.min_volume_ml must be >= 1");
        }
        if self.prescription.max_volume_ml < self.prescription.min_volume_ml {
            eyre::bail!("prescription.max_volume_ml must be >= min_volume_ml");
        }
        if self.prescription.min_duration_min == 0 {
            eyre::bail!("prescription.min_duration_min must be >= 1");
        }
        if self.prescription.max_duration_min < self.prescription.min_duration_min {
            eyre::bail!("prescription.max_duration_min must be >= min_duration_min");
        }
        if self.prescription.default_drip_factor == 0 {
            eyre::bail!("prescription.default_drip_factor must be >= 1");
        }
        if self.prescription.max_drip_factor < self.prescription.default_drip_factor {
            eyre::bail!("prescription.max_drip_factor must be >= default_drip_factor");
        }

        // Detection windows
        if self.detection.drop_debounce_ms == 0 {
            eyre::bail!("detection.drop_debounce_ms must be >= 1");
        }
        if self.detection.button_debounce_ms == 0 {
            eyre::bail!("detection.button_debounce_ms must be >= 1");
        }
        if self.detection.bubble_window_ms == 0 {
            eyre::bail!("detection.bubble_window_ms must be >= 1");
        }
        if self.detection.no_flow_timeout_s == 0 {
            eyre::bail!("detection.no_flow_timeout_s must be >= 1");
        }
        if self.detection.rate_window_s == 0 {
            eyre::bail!("detection.rate_window_s must be >= 1");
        }

        // Thresholds
        if !self.thresholds.low_volume_ml.is_finite() || self.thresholds.low_volume_ml < 0.0 {
            eyre::bail!("thresholds.low_volume_ml must be finite and >= 0");
        }
        if !self.thresholds.warning_volume_ml.is_finite()
            || self.thresholds.warning_volume_ml < self.thresholds.low_volume_ml
        {
            eyre::bail!("thresholds.warning_volume_ml must be >= low_volume_ml");
        }

        // Network: the probe bound must stay strictly below the no-flow
        // alarm latency so a hung probe can never mask an alarm.
        if self.network.recheck_s == 0 {
            eyre::bail!("network.recheck_s must be >= 1");
        }
        if self.network.probe_timeout_ms == 0 {
            eyre::bail!("network.probe_timeout_ms must be >= 1");
        }
        if self.network.probe_timeout_ms >= self.detection.no_flow_timeout_s * 1000 {
            eyre::bail!("network.probe_timeout_ms must be < detection.no_flow_timeout_s");
        }
        if self.network.send_timeout_ms == 0 {
            eyre::bail!("network.send_timeout_ms must be >= 1");
        }

        // Display / loop timing
        if self.display.update_interval_ms == 0 {
            eyre::bail!("display.update_interval_ms must be >= 1");
        }
        if self.timing.tick_ms == 0 || self.timing.tick_ms > 1000 {
            eyre::bail!("timing.tick_ms must be in 1..=1000");
        }

        Ok(())
    }
}

/// WiFi and SMS credentials, loaded from a JSON file kept out of the repo.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Secrets {
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub sms_username: String,
    pub sms_api_key: String,
    pub sms_recipients: Vec<String>,
}

pub fn load_secrets_json(s: &str) -> Result<Secrets, serde_json::Error> {
    serde_json::from_str::<Secrets>(s)
}

pub fn load_secrets_file(path: &std::path::Path) -> eyre::Result<Secrets> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read secrets file {:?}: {}", path, e))?;
    load_secrets_json(&text).map_err(|e| eyre::eyre!("parse secrets file {:?}: {}", path, e))
}
