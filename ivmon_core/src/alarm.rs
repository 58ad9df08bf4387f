//! Alarm arbitration.
//!
//! Every condition the system can alarm on is a pure predicate over one
//! tick's inputs. The predicates live in a single table ordered by
//! clinical priority; the first one that holds is the active alarm for
//! the tick. Silencing applies to the current alarm kind only and is
//! revoked the moment a different kind takes over.

use ivmon_traits::{BuzzerPattern, LedState};

/// Alarm conditions, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    SensorFault,
    Bubble,
    NoFlow,
    LowVolume,
    TimeElapsed,
    Complete,
}

/// One tick's worth of facts the predicates evaluate against. Thresholds
/// ride along so every predicate is a pure function of this struct.
#[derive(Debug, Clone, Copy)]
pub struct AlarmInputs {
    pub sensor_fault: bool,
    pub bubble_active: bool,
    pub ms_since_last_drop: u64,
    pub no_flow_timeout_ms: u64,
    pub remaining_ml: f32,
    pub low_volume_ml: f32,
    pub percent: f32,
    pub elapsed_ms: u64,
    pub duration_ms: u64,
}

impl AlarmInputs {
    fn volume_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

type Predicate = fn(&AlarmInputs) -> bool;

/// Priority-ordered predicate table. Order is the arbitration rule;
/// reordering entries changes clinical behavior.
const TABLE: &[(AlarmKind, Predicate)] = &[
    (AlarmKind::SensorFault, |i| i.sensor_fault),
    (AlarmKind::Bubble, |i| i.bubble_active),
    (AlarmKind::NoFlow, |i| {
        !i.volume_complete() && i.ms_since_last_drop > i.no_flow_timeout_ms
    }),
    (AlarmKind::LowVolume, |i| {
        !i.volume_complete() && i.remaining_ml < i.low_volume_ml
    }),
    (AlarmKind::TimeElapsed, |i| {
        !i.volume_complete() && i.elapsed_ms >= i.duration_ms
    }),
    (AlarmKind::Complete, |i| i.volume_complete()),
];

/// Outcome of one arbitration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmDecision {
    pub active: Option<AlarmKind>,
    /// True on the tick the active kind changed, i.e. the moment to log
    /// and notify.
    pub raised: bool,
}

/// Holds the active alarm and the per-kind silence latch across ticks.
#[derive(Debug, Default)]
pub struct AlarmArbitrator {
    active: Option<AlarmKind>,
    silenced: bool,
}

impl AlarmArbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the table against this tick's inputs. A change of kind
    /// revokes any standing acknowledgement.
    pub fn evaluate(&mut self, inputs: &AlarmInputs) -> AlarmDecision {
        let next = TABLE
            .iter()
            .find(|(_, predicate)| predicate(inputs))
            .map(|(kind, _)| *kind);
        let raised = next.is_some() && next != self.active;
        if next != self.active {
            self.silenced = false;
        }
        self.active = next;
        AlarmDecision {
            active: next,
            raised,
        }
    }

    /// Silence the current alarm. No effect while no alarm is active.
    pub fn acknowledge(&mut self) {
        if self.active.is_some() {
            self.silenced = true;
        }
    }

    pub fn active(&self) -> Option<AlarmKind> {
        self.active
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// Audible pattern for the current state.
    pub fn buzzer_pattern(&self) -> BuzzerPattern {
        if self.silenced {
            return BuzzerPattern::Off;
        }
        match self.active {
            None => BuzzerPattern::Off,
            Some(AlarmKind::SensorFault | AlarmKind::Complete) => BuzzerPattern::Continuous,
            Some(AlarmKind::Bubble) => BuzzerPattern::Pulse { interval_ms: 100 },
            Some(AlarmKind::NoFlow) => BuzzerPattern::Pulse { interval_ms: 200 },
            Some(AlarmKind::LowVolume | AlarmKind::TimeElapsed) => {
                BuzzerPattern::Pulse { interval_ms: 150 }
            }
        }
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.silenced = false;
    }
}

/// Status LED for the current alarm, falling back to the volume
/// thresholds while no alarm is active.
pub fn led_for(
    active: Option<AlarmKind>,
    remaining_ml: f32,
    low_volume_ml: f32,
    warning_volume_ml: f32,
) -> LedState {
    match active {
        Some(AlarmKind::SensorFault | AlarmKind::Bubble | AlarmKind::NoFlow | AlarmKind::LowVolume) => {
            LedState::Red
        }
        Some(AlarmKind::TimeElapsed) => LedState::Yellow,
        Some(AlarmKind::Complete) => LedState::Green,
        None => {
            if remaining_ml <= low_volume_ml {
                LedState::Red
            } else if remaining_ml <= warning_volume_ml {
                LedState::Yellow
            } else {
                LedState::Green
            }
        }
    }
}
