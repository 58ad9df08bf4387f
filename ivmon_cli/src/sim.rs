//! Deterministic infusion simulator.
//!
//! Runs a whole session on simulated time: a scripted keypad enters the
//! prescription, drop edges are published at the prescribed (or
//! overridden) rate, and optional bubble or stall events are injected at
//! fixed session times. Hours of infusion finish in milliseconds.

use eyre::{eyre, Result};
use ivmon_core::latch::EdgeLatch;
use ivmon_core::mocks::{
    MockTransport, RecordingBuzzer, RecordingDisplay, RecordingLeds, ScriptedKeypad, TestButtons,
};
use ivmon_core::{AlarmKind, SessionBuilder, SessionCfg, SessionState};
use ivmon_traits::clock::test_clock::TestClock;
use ivmon_traits::{Channel, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct SimPlan {
    pub volume_ml: u32,
    pub duration_min: u32,
    pub drip_factor: Option<u32>,
    pub drop_interval_ms: Option<u64>,
    pub offline: bool,
    pub bubble_at_ms: Option<u64>,
    pub stall_after_ms: Option<u64>,
    pub max_sim_ms: u64,
}

pub struct SimReport {
    pub final_state: SessionState,
    pub first_alarm: Option<AlarmKind>,
    pub final_alarm: Option<AlarmKind>,
    pub delivered_ml: f32,
    pub percent: f32,
    pub sim_ms: u64,
    pub messages: Vec<String>,
}

fn keys_for(value: u32) -> Vec<Key> {
    let mut keys: Vec<Key> = value
        .to_string()
        .bytes()
        .map(|b| Key::Digit(b - b'0'))
        .collect();
    keys.push(Key::Hash);
    keys
}

pub fn run(cfg: &ivmon_config::Config, plan: &SimPlan, stop: Arc<AtomicBool>) -> Result<SimReport> {
    let drip = plan
        .drip_factor
        .unwrap_or(cfg.prescription.default_drip_factor);
    let drop_interval_ms = plan.drop_interval_ms.unwrap_or_else(|| {
        // Follow the prescribed rate: 60000 / (volume * drip / duration).
        (u64::from(plan.duration_min) * 60_000
            / (u64::from(plan.volume_ml) * u64::from(drip)))
        .max(1)
    });

    let mut keys = keys_for(plan.volume_ml);
    keys.extend(keys_for(plan.duration_min));
    match plan.drip_factor {
        Some(d) => keys.extend(keys_for(d)),
        None => keys.push(Key::Star),
    }

    let clock = TestClock::new();
    let (latch, publisher) = EdgeLatch::new();
    let (buttons, _buttons_handle) = TestButtons::new();
    let transport = if plan.offline {
        MockTransport::offline()
    } else {
        MockTransport::online()
    };
    let sent = transport.sent_log();

    let session_cfg = SessionCfg::from(cfg);
    let tick_ms = session_cfg.timing.tick_ms;
    let mut session = SessionBuilder::new(session_cfg)
        .clock(clock.clone())
        .edges(latch)
        .buttons(buttons)
        .keypad(ScriptedKeypad::new(keys))
        .display(RecordingDisplay::new())
        .leds(RecordingLeds::new())
        .buzzer(RecordingBuzzer::new())
        .transport(transport)
        .stop_flag(stop)
        .build()
        .map_err(|e| eyre!("session assembly failed: {e}"))?;

    info!(
        volume_ml = plan.volume_ml,
        duration_min = plan.duration_min,
        drip,
        drop_interval_ms,
        offline = plan.offline,
        "simulation start"
    );

    let mut now: u64 = 0;
    let mut last_drop: Option<u64> = None;
    let mut bubble_pending = plan.bubble_at_ms;
    let mut first_alarm = None;
    loop {
        if session.state() == SessionState::Monitoring {
            let stalled = plan.stall_after_ms.is_some_and(|t| now >= t);
            let due = last_drop.is_none_or(|t| now.saturating_sub(t) >= drop_interval_ms);
            if !stalled && due {
                publisher.record(Channel::Drop, now);
                last_drop = Some(now);
            }
            if bubble_pending.is_some_and(|t| now >= t) {
                publisher.record(Channel::BubbleIr, now);
                publisher.record(Channel::BubbleSlot, now);
                bubble_pending = None;
            }
        }

        let status = session.tick()?;
        if first_alarm.is_none() {
            first_alarm = session.active_alarm();
        }
        if status == ivmon_core::TickStatus::Terminated
            || session.state() == SessionState::Complete
            || now >= plan.max_sim_ms
        {
            break;
        }
        clock.advance(Duration::from_millis(tick_ms));
        now += tick_ms;
        if yield_point(now) {
            // Let the Ctrl-C handler thread get scheduled between fast
            // simulated ticks.
            std::thread::yield_now();
        }
    }

    let metrics = session.metrics();
    let messages = sent.lock().map_err(|_| eyre!("send log poisoned"))?.clone();
    Ok(SimReport {
        final_state: session.state(),
        first_alarm,
        final_alarm: session.active_alarm(),
        delivered_ml: metrics.map_or(0.0, |m| m.delivered_ml),
        percent: metrics.map_or(0.0, |m| m.percent),
        sim_ms: now,
        messages,
    })
}

fn yield_point(now: u64) -> bool {
    now % 60_000 == 0
}
