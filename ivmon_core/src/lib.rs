#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core infusion-session logic (hardware-agnostic).
//!
//! This crate fuses debounced sensor edges, operator buttons, and periodic
//! connectivity checks into one consistent session state. All hardware
//! interactions go through the `ivmon_traits` seam traits.
//!
//! ## Architecture
//!
//! - **Prescription**: validated volume/duration/drip factor (`prescription`)
//! - **Edge capture**: per-channel read-then-clear latch (`latch`)
//! - **Debounce**: per-channel pulse and button debouncing (`debounce`)
//! - **Metrics**: drop counting with a 60 s sliding rate window (`drops`)
//! - **Bubble**: dual-sensor confirmation within 400 ms (`bubble`)
//! - **Alarms**: ordered predicate table, one active per cycle (`alarm`)
//! - **Uplink**: worker thread bounding probe/send calls (`uplink`)
//! - **Notifications**: one-shot-per-session dedup flags (`notify`)
//! - **Session**: the top-level state machine (`session`)
//!
//! The session runs in a single execution context with a fixed tick; the
//! only blocking waits are the bounded uplink replies, each strictly
//! shorter than any alarm latency.

pub mod alarm;
pub mod bubble;
pub mod config;
pub mod conversions;
pub mod debounce;
pub mod display;
pub mod drops;
pub mod error;
pub mod latch;
pub mod mocks;
pub mod network;
pub mod notify;
pub mod prescription;
pub mod session;
pub mod uplink;

pub use alarm::{AlarmArbitrator, AlarmInputs, AlarmKind};
pub use bubble::BubbleDetector;
pub use config::{
    DetectionCfg, DisplayCfg, NetworkCfg, NotifyCfg, PrescriptionLimits, SessionCfg, ThresholdCfg,
    TimingCfg,
};
pub use debounce::{ButtonDebouncer, PulseDebouncer};
pub use drops::{DropCounter, DropMetrics};
pub use error::{BuildError, MonitorError, ValidationError};
pub use latch::{EdgeLatch, EdgePublisher};
pub use network::{NetworkMode, NetworkModeMonitor};
pub use notify::{NotificationDispatcher, NotificationFlags, NotificationKind};
pub use prescription::{EntryOutcome, Prescription, PrescriptionEntry};
pub use session::{Session, SessionBuilder, SessionState, TickStatus};
pub use uplink::Uplink;
