//! End-to-end session tests on simulated time.

use ivmon_core::latch::EdgePublisher;
use ivmon_core::mocks::{
    MockTransport, RecordingBuzzer, RecordingDisplay, RecordingLeds, ScriptedKeypad, TestButtons,
    TestButtonsHandle,
};
use ivmon_core::{
    AlarmKind, EdgeLatch, NetworkMode, SessionBuilder, SessionCfg, SessionState, TickStatus,
};
use ivmon_traits::clock::test_clock::TestClock;
use ivmon_traits::{Button, Channel, Key};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Harness {
    session: ivmon_core::session::SessionCore<EdgeLatch>,
    clock: TestClock,
    edges: EdgePublisher,
    buttons: TestButtonsHandle,
    sent: Arc<Mutex<Vec<String>>>,
    /// Simulated milliseconds since the session epoch.
    now: u64,
}

impl Harness {
    /// Session wired to mocks; keypad preloaded with `keys`.
    fn new(keys: Vec<Key>) -> Self {
        Self::with_transport(keys, MockTransport::online())
    }

    fn with_transport(keys: Vec<Key>, transport: MockTransport) -> Self {
        let clock = TestClock::new();
        let (latch, publisher) = EdgeLatch::new();
        let (buttons, handle) = TestButtons::new();
        let sent = transport.sent_log();
        let session = SessionBuilder::new(SessionCfg::default())
            .clock(clock.clone())
            .edges(latch)
            .buttons(buttons)
            .keypad(ScriptedKeypad::new(keys))
            .display(RecordingDisplay::new())
            .leds(RecordingLeds::new())
            .buzzer(RecordingBuzzer::new())
            .transport(transport)
            .build()
            .unwrap();
        Self {
            session,
            clock,
            edges: publisher,
            buttons: handle,
            sent,
            now: 0,
        }
    }

    /// One tick, then advance simulated time by the tick period.
    fn tick(&mut self) -> TickStatus {
        let status = self.session.tick().unwrap();
        self.clock.advance(Duration::from_millis(200));
        self.now += 200;
        status
    }

    /// Record a drop edge at the current simulated time.
    fn drop_pulse(&mut self) {
        self.edges.record(Channel::Drop, self.now);
    }

    fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Hold a button across two ticks so the 30 ms stabilization passes.
    fn press(&mut self, button: Button) {
        self.buttons.press(button);
        self.ticks(2);
        self.buttons.release(button);
        self.ticks(2);
    }

    fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

/// Keys entering a 1 mL / 1 min prescription with the default drip
/// factor, so 20 drops complete the infusion.
fn tiny_rx_keys() -> Vec<Key> {
    vec![Key::Digit(1), Key::Hash, Key::Digit(1), Key::Hash, Key::Star]
}

/// Drive the session from boot into Monitoring.
fn into_monitoring(h: &mut Harness) {
    h.tick(); // Init: connectivity check
    assert_eq!(h.session.state(), SessionState::PrescriptionInput);
    h.tick(); // keypad drained, prescription confirmed
    assert_eq!(h.session.state(), SessionState::RateDisplay);
    h.ticks(16); // past the 3 s summary hold
    assert_eq!(h.session.state(), SessionState::Monitoring);
}

#[test]
fn boot_checks_network_then_prompts() {
    let mut h = Harness::new(Vec::new());
    h.tick();
    assert_eq!(h.session.state(), SessionState::PrescriptionInput);
    assert_eq!(h.session.network_mode(), NetworkMode::Online);
}

#[test]
fn offline_boot_is_local_only() {
    let mut h = Harness::with_transport(Vec::new(), MockTransport::offline());
    h.tick();
    assert_eq!(h.session.network_mode(), NetworkMode::LocalOnly);
}

#[test]
fn invalid_entry_reprompts_without_leaving_input() {
    // 0 mL is rejected; the operator retries with 1 mL.
    let keys = vec![
        Key::Digit(0),
        Key::Hash,
        Key::Digit(1),
        Key::Hash,
        Key::Digit(1),
        Key::Hash,
        Key::Star,
    ];
    let mut h = Harness::new(keys);
    h.ticks(2);
    assert_eq!(h.session.state(), SessionState::RateDisplay);
    let rx = h.session.prescription().unwrap();
    assert_eq!(rx.target_volume_ml(), 1);
    assert_eq!(rx.drip_factor(), 20);
}

#[test]
fn drops_complete_the_infusion_with_milestones() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);

    // 20 drops at one per tick (200 ms spacing clears the 80 ms debounce).
    for _ in 0..20 {
        h.drop_pulse();
        h.tick();
    }
    assert_eq!(h.session.state(), SessionState::Complete);
    assert_eq!(h.session.active_alarm(), Some(AlarmKind::Complete));

    let sent = h.sent_messages();
    assert_eq!(sent[0], "IV monitoring started: 1mL over 1min (0% delivered)");
    assert!(sent.contains(&"IV delivered 25%.".to_owned()));
    assert!(sent.contains(&"IV delivered 50%.".to_owned()));
    assert!(sent.contains(&"IV delivered 100%.".to_owned()));
    // One message per milestone, no repeats.
    assert_eq!(sent.iter().filter(|m| *m == "IV delivered 25%.").count(), 1);
}

#[test]
fn silence_raises_no_flow_before_time_elapsed() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);
    // 30 s of silence is 150 ticks; duration (60 s) is not yet elapsed.
    h.ticks(151);
    assert_eq!(h.session.state(), SessionState::Monitoring);
    assert_eq!(h.session.active_alarm(), Some(AlarmKind::NoFlow));
    assert!(h
        .sent_messages()
        .contains(&"NO FLOW - Check IV line (0 mL delivered)".to_owned()));
}

#[test]
fn bubble_requires_both_channels_within_window() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);

    // Single channel: no alarm.
    h.edges.record(Channel::BubbleIr, h.now);
    h.tick();
    assert_ne!(h.session.active_alarm(), Some(AlarmKind::Bubble));
    h.ticks(3); // lone pulse ages past the window

    // Both channels 200 ms apart: alarm.
    h.edges.record(Channel::BubbleIr, h.now);
    h.tick();
    h.edges.record(Channel::BubbleSlot, h.now);
    h.tick();
    assert_eq!(h.session.active_alarm(), Some(AlarmKind::Bubble));
    assert!(h
        .sent_messages()
        .contains(&"BUBBLE DETECTED - CHECK IV LINE".to_owned()));
}

#[test]
fn cal_resets_counters_but_keeps_prescription() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);
    for _ in 0..5 {
        h.drop_pulse();
        h.tick();
    }
    assert!(h.session.metrics().unwrap().delivered_ml > 0.0);

    h.press(Button::Cal);
    assert_eq!(h.session.state(), SessionState::Monitoring);
    assert!(h.session.prescription().is_some());
    assert_eq!(h.session.metrics().unwrap().delivered_ml, 0.0);
}

#[test]
fn new_resets_everything_back_to_input() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);
    h.press(Button::New);
    assert_eq!(h.session.state(), SessionState::PrescriptionInput);
    assert!(h.session.prescription().is_none());
    assert!(h.session.metrics().is_none());
}

#[test]
fn new_during_rate_display_returns_to_input() {
    let mut h = Harness::new(tiny_rx_keys());
    h.ticks(2);
    assert_eq!(h.session.state(), SessionState::RateDisplay);
    h.press(Button::New);
    assert_eq!(h.session.state(), SessionState::PrescriptionInput);
    assert!(h.session.prescription().is_none());
}

#[test]
fn sensor_fault_survives_new_reset() {
    // Two prescriptions queued: one for the faulted run, one entered
    // after NEW.
    let mut keys = tiny_rx_keys();
    keys.extend(tiny_rx_keys());
    let mut h = Harness::new(keys);
    into_monitoring(&mut h);
    h.edges.raise_fault("drop sensor open circuit");
    h.tick();
    assert_eq!(h.session.active_alarm(), Some(AlarmKind::SensorFault));

    // NEW wipes the delivery cycle; the remaining keys confirm the
    // second prescription.
    h.press(Button::New);
    assert!(h.session.metrics().is_none());
    assert_eq!(h.session.state(), SessionState::RateDisplay);
    h.ticks(16);
    assert_eq!(h.session.state(), SessionState::Monitoring);
    h.tick();
    // The latched fault outranks everything as soon as monitoring
    // resumes.
    assert_eq!(h.session.active_alarm(), Some(AlarmKind::SensorFault));
}

#[test]
fn term_shuts_down_from_any_state() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);
    h.buttons.press(Button::Term);
    h.tick();
    let status = h.tick();
    assert_eq!(status, TickStatus::Terminated);
    assert_eq!(h.session.state(), SessionState::Terminated);
}

#[test]
fn cal_from_complete_returns_to_monitoring() {
    let mut h = Harness::new(tiny_rx_keys());
    into_monitoring(&mut h);
    for _ in 0..20 {
        h.drop_pulse();
        h.tick();
    }
    assert_eq!(h.session.state(), SessionState::Complete);

    h.press(Button::Cal);
    assert_eq!(h.session.state(), SessionState::Monitoring);
    assert_eq!(h.session.metrics().unwrap().delivered_ml, 0.0);
    // The new delivery cycle reports its own milestones again.
    for _ in 0..20 {
        h.drop_pulse();
        h.tick();
    }
    assert_eq!(h.session.state(), SessionState::Complete);
    assert_eq!(
        h.sent_messages()
            .iter()
            .filter(|m| *m == "IV delivered 100%.")
            .count(),
        2
    );
}

#[test]
fn offline_suppresses_sends_but_keeps_alarming() {
    let mut h = Harness::with_transport(tiny_rx_keys(), MockTransport::offline());
    into_monitoring(&mut h);
    h.ticks(151);
    assert_eq!(h.session.active_alarm(), Some(AlarmKind::NoFlow));
    assert!(h.sent_messages().is_empty());
}

#[test]
fn completion_milestones_catch_up_after_reconnect() {
    let transport = MockTransport::offline();
    let online = transport.online_flag();
    let mut h = Harness::with_transport(tiny_rx_keys(), transport);
    into_monitoring(&mut h);
    for _ in 0..20 {
        h.drop_pulse();
        h.tick();
    }
    assert_eq!(h.session.state(), SessionState::Complete);
    assert!(h.sent_messages().is_empty());

    // Connectivity returns; the next 60 s recheck flips the mode and
    // the unsent milestones go out from the finished session.
    online.store(true, Ordering::SeqCst);
    h.ticks(310);
    let sent = h.sent_messages();
    assert!(sent.contains(&"IV delivered 100%.".to_owned()));
    // The start announcement is attempted once and never caught up.
    assert!(!sent.iter().any(|m| m.starts_with("IV monitoring started")));
}

#[test]
fn builder_rejects_missing_collaborators() {
    use ivmon_core::mocks::NoopEdges;
    let Err(err) = SessionBuilder::<NoopEdges>::new(SessionCfg::default()).build() else {
        panic!("builder accepted a session with no collaborators");
    };
    assert!(matches!(err, ivmon_core::BuildError::MissingEdges));
}

#[test]
fn builder_rejects_probe_bound_above_no_flow_timeout() {
    use ivmon_core::mocks::NoopEdges;
    let mut cfg = SessionCfg::default();
    cfg.network.probe_timeout_ms = 40_000;
    let Err(err) = SessionBuilder::<NoopEdges>::new(cfg).build() else {
        panic!("builder accepted a probe bound above the no-flow timeout");
    };
    assert!(matches!(err, ivmon_core::BuildError::InvalidConfig(_)));
}
