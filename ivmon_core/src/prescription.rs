//! Clinician-entered prescription and the keypad entry flow.

use crate::config::PrescriptionLimits;
use crate::error::ValidationError;
use ivmon_traits::Key;

/// Validated target volume, duration, and drip factor. Immutable once
/// confirmed; a full reset replaces it wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prescription {
    target_volume_ml: u32,
    duration_min: u32,
    drip_factor: u32,
}

impl Prescription {
    pub fn new(
        target_volume_ml: u32,
        duration_min: u32,
        drip_factor: u32,
        limits: &PrescriptionLimits,
    ) -> Result<Self, ValidationError> {
        if !(limits.min_volume_ml..=limits.max_volume_ml).contains(&target_volume_ml) {
            return Err(ValidationError::Volume(
                target_volume_ml,
                limits.min_volume_ml,
                limits.max_volume_ml,
            ));
        }
        if !(limits.min_duration_min..=limits.max_duration_min).contains(&duration_min) {
            return Err(ValidationError::Duration(
                duration_min,
                limits.min_duration_min,
                limits.max_duration_min,
            ));
        }
        if drip_factor == 0 || drip_factor > limits.max_drip_factor {
            return Err(ValidationError::DripFactor(
                drip_factor,
                limits.max_drip_factor,
            ));
        }
        Ok(Self {
            target_volume_ml,
            duration_min,
            drip_factor,
        })
    }

    pub fn target_volume_ml(&self) -> u32 {
        self.target_volume_ml
    }

    pub fn duration_min(&self) -> u32 {
        self.duration_min
    }

    /// Prescribed infusion duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_min) * 60_000
    }

    /// Drops per milliliter for the installed tubing set (gtt/mL).
    pub fn drip_factor(&self) -> u32 {
        self.drip_factor
    }

    /// Target delivery rate in drops per minute.
    pub fn target_rate_gtt_min(&self) -> f32 {
        (self.target_volume_ml * self.drip_factor) as f32 / self.duration_min as f32
    }

    /// Target delivery rate in mL per hour.
    pub fn target_rate_ml_hr(&self) -> f32 {
        self.target_volume_ml as f32 / self.duration_min as f32 * 60.0
    }
}

/// Which value the operator is currently entering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStage {
    Volume,
    Duration,
    DripFactor,
}

/// Result of feeding one key into the entry flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Buffer changed (digit or backspace); redraw the input line.
    Editing,
    /// Stage confirmed; moved on to the next prompt.
    Advanced,
    /// Value out of range; buffer cleared, show the hint and re-prompt.
    Rejected(ValidationError),
    /// All three values validated; the prescription is confirmed.
    Complete(Prescription),
}

const MAX_DIGITS: usize = 4;

/// Non-blocking keypad entry state machine for one prescription.
///
/// Digits append to a bounded buffer, `*` is backspace (or "use default"
/// on the drip-factor stage), `#` confirms. Invalid values are recovered
/// locally by re-prompting; nothing propagates out of the input state.
#[derive(Debug)]
pub struct PrescriptionEntry {
    limits: PrescriptionLimits,
    stage: EntryStage,
    buffer: String,
    volume_ml: Option<u32>,
    duration_min: Option<u32>,
}

impl PrescriptionEntry {
    pub fn new(limits: PrescriptionLimits) -> Self {
        Self {
            limits,
            stage: EntryStage::Volume,
            buffer: String::new(),
            volume_ml: None,
            duration_min: None,
        }
    }

    pub fn stage(&self) -> EntryStage {
        self.stage
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Prompt text for the current stage (display line 1).
    pub fn prompt(&self) -> &'static str {
        match self.stage {
            EntryStage::Volume => "Enter Volume (mL):",
            EntryStage::Duration => "Enter Time (min):",
            EntryStage::DripFactor => "Drip Factor gtt/mL",
        }
    }

    /// Footer text for the current stage (display line 3).
    pub fn footer(&self) -> &'static str {
        match self.stage {
            EntryStage::Volume | EntryStage::Duration => "#=OK *=Backspace",
            EntryStage::DripFactor => "#=OK *=Use Default",
        }
    }

    pub fn handle_key(&mut self, key: Key) -> EntryOutcome {
        match key {
            Key::Digit(d) => {
                if self.buffer.len() < MAX_DIGITS {
                    self.buffer.push(char::from(b'0' + (d % 10)));
                }
                EntryOutcome::Editing
            }
            Key::Star => {
                if self.stage == EntryStage::DripFactor && self.buffer.is_empty() {
                    // Use the default drip factor without typing it.
                    return self.confirm_value(self.limits.default_drip_factor);
                }
                self.buffer.pop();
                EntryOutcome::Editing
            }
            Key::Hash => {
                let value = self.buffer.parse::<u32>().unwrap_or(0);
                self.confirm_value(value)
            }
        }
    }

    fn confirm_value(&mut self, value: u32) -> EntryOutcome {
        let limits = self.limits;
        match self.stage {
            EntryStage::Volume => {
                if !(limits.min_volume_ml..=limits.max_volume_ml).contains(&value) {
                    self.buffer.clear();
                    return EntryOutcome::Rejected(ValidationError::Volume(
                        value,
                        limits.min_volume_ml,
                        limits.max_volume_ml,
                    ));
                }
                self.volume_ml = Some(value);
                self.stage = EntryStage::Duration;
                self.buffer.clear();
                EntryOutcome::Advanced
            }
            EntryStage::Duration => {
                if !(limits.min_duration_min..=limits.max_duration_min).contains(&value) {
                    self.buffer.clear();
                    return EntryOutcome::Rejected(ValidationError::Duration(
                        value,
                        limits.min_duration_min,
                        limits.max_duration_min,
                    ));
                }
                self.duration_min = Some(value);
                self.stage = EntryStage::DripFactor;
                self.buffer.clear();
                EntryOutcome::Advanced
            }
            EntryStage::DripFactor => {
                let volume = self.volume_ml.unwrap_or(limits.min_volume_ml);
                let duration = self.duration_min.unwrap_or(limits.min_duration_min);
                match Prescription::new(volume, duration, value, &limits) {
                    Ok(p) => EntryOutcome::Complete(p),
                    Err(e) => {
                        self.buffer.clear();
                        EntryOutcome::Rejected(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PrescriptionLimits {
        PrescriptionLimits::default()
    }

    #[test]
    fn derived_rates_match_formula() {
        let p = Prescription::new(120, 60, 20, &limits()).unwrap();
        assert_eq!(p.target_rate_gtt_min(), 40.0);
        assert_eq!(p.target_rate_ml_hr(), 120.0);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        assert!(matches!(
            Prescription::new(0, 60, 20, &limits()),
            Err(ValidationError::Volume(0, 1, 1500))
        ));
        assert!(matches!(
            Prescription::new(1501, 60, 20, &limits()),
            Err(ValidationError::Volume(..))
        ));
    }

    #[test]
    fn entry_flow_confirms_prescription() {
        let mut entry = PrescriptionEntry::new(limits());
        entry.handle_key(Key::Digit(1));
        entry.handle_key(Key::Digit(2));
        entry.handle_key(Key::Digit(0));
        assert_eq!(entry.buffer(), "120");
        assert_eq!(entry.handle_key(Key::Hash), EntryOutcome::Advanced);

        entry.handle_key(Key::Digit(6));
        entry.handle_key(Key::Digit(0));
        assert_eq!(entry.handle_key(Key::Hash), EntryOutcome::Advanced);

        // Star on the drip stage with an empty buffer applies the default.
        match entry.handle_key(Key::Star) {
            EntryOutcome::Complete(p) => {
                assert_eq!(p.target_volume_ml(), 120);
                assert_eq!(p.duration_min(), 60);
                assert_eq!(p.drip_factor(), 20);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn entry_rejects_and_reprompts() {
        let mut entry = PrescriptionEntry::new(limits());
        // Empty confirm parses as 0, which is below the minimum.
        assert!(matches!(
            entry.handle_key(Key::Hash),
            EntryOutcome::Rejected(ValidationError::Volume(0, ..))
        ));
        assert_eq!(entry.stage(), EntryStage::Volume);
        assert_eq!(entry.buffer(), "");
    }

    #[test]
    fn backspace_edits_buffer() {
        let mut entry = PrescriptionEntry::new(limits());
        entry.handle_key(Key::Digit(9));
        entry.handle_key(Key::Digit(9));
        entry.handle_key(Key::Star);
        assert_eq!(entry.buffer(), "9");
    }

    #[test]
    fn buffer_is_bounded() {
        let mut entry = PrescriptionEntry::new(limits());
        for _ in 0..10 {
            entry.handle_key(Key::Digit(1));
        }
        assert_eq!(entry.buffer().len(), 4);
    }
}
