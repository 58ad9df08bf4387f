//! 20x4 character display frames.
//!
//! Frames are built as plain data and painted through the
//! [`DisplaySurface`] trait, so every screen the operator can see is
//! constructible and assertable in tests without hardware. Lines are
//! fixed width: shorter text is space padded so a repaint fully
//! overwrites the previous content.

use crate::alarm::AlarmKind;
use crate::drops::DropMetrics;
use crate::network::NetworkMode;
use crate::prescription::Prescription;
use ivmon_traits::DisplaySurface;

pub const COLS: usize = 20;
pub const ROWS: usize = 4;

/// One full screen, each line padded to [`COLS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    lines: [String; ROWS],
}

impl Frame {
    pub fn new(l0: &str, l1: &str, l2: &str, l3: &str) -> Self {
        Self {
            lines: [pad(l0), pad(l1), pad(l2), pad(l3)],
        }
    }

    pub fn line(&self, row: usize) -> &str {
        &self.lines[row]
    }
}

fn pad(text: &str) -> String {
    let mut line: String = text.chars().take(COLS).collect();
    while line.len() < COLS {
        line.push(' ');
    }
    line
}

/// Throttled, diffing painter. Repaints at the configured cadence and
/// skips identical frames so the bus stays quiet between changes.
#[derive(Debug)]
pub struct FramePainter {
    interval_ms: u64,
    last_paint_ms: Option<u64>,
    last: Option<Frame>,
}

impl FramePainter {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_paint_ms: None,
            last: None,
        }
    }

    /// Paint if the cadence allows and the frame changed. Returns true
    /// when lines were actually written.
    pub fn paint(&mut self, frame: &Frame, now_ms: u64, surface: &mut dyn DisplaySurface) -> bool {
        if let Some(last) = self.last_paint_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return false;
            }
        }
        self.paint_now(frame, now_ms, surface)
    }

    /// Paint immediately, ignoring the cadence. Used on state changes.
    pub fn paint_now(&mut self, frame: &Frame, now_ms: u64, surface: &mut dyn DisplaySurface) -> bool {
        if self.last.as_ref() == Some(frame) {
            self.last_paint_ms = Some(now_ms);
            return false;
        }
        for (row, line) in frame.lines.iter().enumerate() {
            let unchanged = self
                .last
                .as_ref()
                .is_some_and(|prev| prev.lines[row] == *line);
            if !unchanged {
                surface.write_line(row as u8, line);
            }
        }
        self.last = Some(frame.clone());
        self.last_paint_ms = Some(now_ms);
        true
    }

    pub fn invalidate(&mut self) {
        self.last = None;
        self.last_paint_ms = None;
    }
}

pub fn boot() -> Frame {
    Frame::new("IV MONITORING SYSTEM", "Drop Counter + Bubble", "Booting...", "")
}

pub fn entry(prompt: &str, buffer: &str, footer: &str) -> Frame {
    Frame::new("IV PRESCRIPTION", prompt, &format!("Input: {buffer}"), footer)
}

pub fn entry_invalid(prompt: &str, hint: &str, footer: &str) -> Frame {
    Frame::new("IV PRESCRIPTION", prompt, hint, footer)
}

/// Confirmation screen shown before monitoring begins.
pub fn rate_summary(rx: &Prescription) -> Frame {
    Frame::new(
        "PRESCRIPTION SET",
        &format!("Vol: {} mL", rx.target_volume_ml()),
        &format!("Time: {} min", rx.duration_min()),
        &format!("Set: {} gtt/min", rx.target_rate_gtt_min() as u32),
    )
}

/// Status text for the bottom line of the monitoring screen.
fn monitoring_status(alarm: Option<AlarmKind>, mode: NetworkMode) -> &'static str {
    match (alarm, mode) {
        (Some(AlarmKind::LowVolume), NetworkMode::Online) => "LOW VOLUME ALERT",
        (Some(AlarmKind::LowVolume), NetworkMode::LocalOnly) => "LOW VOL SMS:OFF",
        (_, NetworkMode::Online) => "ONLINE  SMS ON",
        (_, NetworkMode::LocalOnly) => "LOCAL ONLY SMS OFF",
    }
}

pub fn monitoring(
    metrics: &DropMetrics,
    rx: &Prescription,
    alarm: Option<AlarmKind>,
    mode: NetworkMode,
) -> Frame {
    Frame::new(
        &format!(
            "VOL {:03}/{:03} mL",
            metrics.delivered_ml as u32,
            rx.target_volume_ml()
        ),
        &format!(
            "% {:02}  Rem {:03}mL",
            metrics.percent as u32, metrics.remaining_ml as u32
        ),
        &format!(
            "Rate {:02}gtt {:02}mLh",
            metrics.rate_gtt_min as u32, metrics.rate_ml_hr as u32
        ),
        monitoring_status(alarm, mode),
    )
}

pub fn bubble_alarm(mode: NetworkMode) -> Frame {
    let mode_text = match mode {
        NetworkMode::Online => "ONLINE",
        NetworkMode::LocalOnly => "LOCAL ONLY",
    };
    Frame::new(
        "** BUBBLE DETECTED **",
        "CHECK IV LINE!",
        "Press ACK to clear",
        mode_text,
    )
}

pub fn no_flow(metrics: &DropMetrics, rx: &Prescription) -> Frame {
    Frame::new(
        "** NO FLOW **",
        "Check line/clamp",
        &format!(
            "Vol: {}/{}mL",
            metrics.delivered_ml as u32,
            rx.target_volume_ml()
        ),
        "ACK=Continue",
    )
}

pub fn time_elapsed(metrics: &DropMetrics, rx: &Prescription) -> Frame {
    Frame::new(
        "** TIME ELAPSED **",
        "Volume incomplete",
        &format!(
            "{}/{}mL ({}%)",
            metrics.delivered_ml as u32,
            rx.target_volume_ml(),
            metrics.percent as u32
        ),
        "ACK=Continue",
    )
}

pub fn complete(metrics: &DropMetrics) -> Frame {
    Frame::new(
        "INFUSION COMPLETE",
        &format!("{}mL delivered", metrics.delivered_ml as u32),
        "100%",
        "Press NEW or TERM",
    )
}

pub fn sensor_fault(detail: &str) -> Frame {
    Frame::new("** SENSOR FAULT **", detail, "Check connections", "TERM=End session")
}

pub fn counters_reset() -> Frame {
    Frame::new("COUNTERS RESET", "Prescription kept", "Monitoring...", "")
}

pub fn terminated() -> Frame {
    Frame::new("SESSION ENDED", "System terminated", "", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrescriptionLimits;
    use crate::mocks::RecordingDisplay;

    fn rx() -> Prescription {
        Prescription::new(120, 60, 20, &PrescriptionLimits::default()).unwrap()
    }

    fn metrics(delivered: f32) -> DropMetrics {
        DropMetrics {
            delivered_ml: delivered,
            remaining_ml: 120.0 - delivered,
            percent: delivered / 120.0 * 100.0,
            rate_gtt_min: 40.0,
            rate_ml_hr: 120.0,
            eta_hours: Some(1.0),
            ms_since_last_drop: 500,
        }
    }

    #[test]
    fn lines_are_fixed_width() {
        let f = boot();
        for row in 0..ROWS {
            assert_eq!(f.line(row).len(), COLS);
        }
    }

    #[test]
    fn monitoring_frame_formats_fields() {
        let f = monitoring(&metrics(45.0), &rx(), None, NetworkMode::Online);
        assert_eq!(f.line(0).trim_end(), "VOL 045/120 mL");
        assert_eq!(f.line(1).trim_end(), "% 37  Rem 075mL");
        assert_eq!(f.line(2).trim_end(), "Rate 40gtt 120mLh");
        assert_eq!(f.line(3).trim_end(), "ONLINE  SMS ON");
    }

    #[test]
    fn status_line_tracks_mode_and_low_volume() {
        let f = monitoring(&metrics(45.0), &rx(), None, NetworkMode::LocalOnly);
        assert_eq!(f.line(3).trim_end(), "LOCAL ONLY SMS OFF");
        let f = monitoring(
            &metrics(45.0),
            &rx(),
            Some(AlarmKind::LowVolume),
            NetworkMode::Online,
        );
        assert_eq!(f.line(3).trim_end(), "LOW VOLUME ALERT");
    }

    #[test]
    fn painter_throttles_and_diffs() {
        let mut painter = FramePainter::new(500);
        let mut surface = RecordingDisplay::new();
        assert!(painter.paint(&boot(), 0, &mut surface));
        // Within the cadence: nothing painted even if the frame changed.
        assert!(!painter.paint(&terminated(), 200, &mut surface));
        // Past the cadence but identical frame: skipped.
        assert!(!painter.paint(&boot(), 600, &mut surface));
        // Past the cadence with a new frame: painted.
        assert!(painter.paint(&terminated(), 1_200, &mut surface));
    }

    #[test]
    fn paint_now_ignores_cadence() {
        let mut painter = FramePainter::new(500);
        let mut surface = RecordingDisplay::new();
        painter.paint(&boot(), 0, &mut surface);
        assert!(painter.paint_now(&terminated(), 100, &mut surface));
        assert_eq!(surface.line(0).trim_end(), "SESSION ENDED");
    }
}
