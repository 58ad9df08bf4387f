//! Top-level infusion session state machine.
//!
//! One owned context, one fixed-period tick. Each tick reads the latched
//! sensor edges exactly once, debounces buttons, advances the detectors,
//! arbitrates alarms, and writes every output surface. No collaborator
//! writes the display, LEDs, or buzzer except through this tick.

use crate::alarm::{led_for, AlarmArbitrator, AlarmInputs, AlarmKind};
use crate::bubble::BubbleDetector;
use crate::config::SessionCfg;
use crate::debounce::{ButtonDebouncer, PulseDebouncer};
use crate::display::{self, FramePainter};
use crate::drops::{DropCounter, DropMetrics};
use crate::error::BuildError;
use crate::network::{NetworkMode, NetworkModeMonitor};
use crate::notify::{NotificationDispatcher, NotifyContext};
use crate::prescription::{EntryOutcome, Prescription, PrescriptionEntry};
use crate::uplink::Uplink;
use crate::ValidationError;
use ivmon_traits::{
    Button, ButtonPad, Buzzer, BuzzerPattern, Channel, Clock, DisplaySurface, EdgeSource, Keypad,
    LedState, StatusLeds, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Session lifecycle states. Alarm conditions are not states; they are
/// arbitrated every monitoring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    PrescriptionInput,
    RateDisplay,
    Monitoring,
    Complete,
    Terminated,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    Terminated,
}

/// Everything that lives for one delivery cycle and dies on reset.
struct MonitorContext {
    session_start_ms: u64,
    drops: DropCounter,
    drop_debounce: PulseDebouncer,
    ir_debounce: PulseDebouncer,
    slot_debounce: PulseDebouncer,
    bubble: BubbleDetector,
    arbitrator: AlarmArbitrator,
    dispatcher: NotificationDispatcher,
}

impl MonitorContext {
    fn new(cfg: &SessionCfg, now_ms: u64, dispatcher: NotificationDispatcher) -> Self {
        Self {
            session_start_ms: now_ms,
            drops: DropCounter::new(cfg.detection.rate_window_ms, now_ms),
            drop_debounce: PulseDebouncer::new(cfg.detection.drop_debounce_ms),
            ir_debounce: PulseDebouncer::new(cfg.detection.drop_debounce_ms),
            slot_debounce: PulseDebouncer::new(cfg.detection.drop_debounce_ms),
            bubble: BubbleDetector::new(cfg.detection.bubble_window_ms),
            arbitrator: AlarmArbitrator::new(),
            dispatcher,
        }
    }

    /// Counters-only reset: keep the prescription, restart the delivery
    /// cycle from zero.
    fn reset(&mut self, now_ms: u64) {
        self.session_start_ms = now_ms;
        self.drops.reset(now_ms);
        self.drop_debounce.reset();
        self.ir_debounce.reset();
        self.slot_debounce.reset();
        self.bubble.reset();
        self.arbitrator.reset();
        self.dispatcher.reset();
    }
}

/// The session core, generic over the edge source on the hot path; every
/// other collaborator sits behind a boxed trait.
pub struct SessionCore<E: EdgeSource> {
    cfg: SessionCfg,
    clock: Box<dyn Clock>,
    epoch: Instant,
    edges: E,
    buttons: Box<dyn ButtonPad>,
    keypad: Box<dyn Keypad>,
    surface: Box<dyn DisplaySurface>,
    leds: Box<dyn StatusLeds>,
    buzzer: Box<dyn Buzzer>,
    uplink: Uplink,
    stop: Option<Arc<AtomicBool>>,

    state: SessionState,
    state_entered_ms: u64,
    button_debounce: ButtonDebouncer,
    network: NetworkModeMonitor,
    painter: FramePainter,
    entry: PrescriptionEntry,
    entry_error: Option<String>,
    prescription: Option<Prescription>,
    monitor: Option<MonitorContext>,
    /// Latched sensor fault. Survives NEW and CAL; only TERM ends it.
    fault: Option<String>,
}

/// Session over a boxed edge source, the common CLI/runtime shape.
pub type Session = SessionCore<Box<dyn EdgeSource>>;

impl<E: EdgeSource> SessionCore<E> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn network_mode(&self) -> NetworkMode {
        self.network.mode()
    }

    pub fn prescription(&self) -> Option<Prescription> {
        self.prescription
    }

    pub fn active_alarm(&self) -> Option<AlarmKind> {
        self.monitor.as_ref().and_then(|m| m.arbitrator.active())
    }

    /// Current delivery figures, if a delivery cycle is active.
    pub fn metrics(&self) -> Option<DropMetrics> {
        let now = self.clock.ms_since(self.epoch);
        let rx = self.prescription?;
        Some(self.monitor.as_ref()?.drops.metrics(&rx, now))
    }

    /// Run ticks at the configured period until terminated.
    pub fn run(&mut self) -> crate::error::Result<()> {
        let period = Duration::from_millis(self.cfg.timing.tick_ms);
        loop {
            if self.tick()? == TickStatus::Terminated {
                return Ok(());
            }
            self.clock.sleep(period);
        }
    }

    /// Advance the session by one cycle.
    pub fn tick(&mut self) -> crate::error::Result<TickStatus> {
        if self.state == SessionState::Terminated {
            return Ok(TickStatus::Terminated);
        }
        let now = self.clock.ms_since(self.epoch);

        let pressed = self.read_buttons(now);
        let stop_requested = self
            .stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst));
        if pressed[Button::Term.index()] || stop_requested {
            self.terminate(now);
            return Ok(TickStatus::Terminated);
        }

        match self.state {
            SessionState::Init => self.init_cycle(now),
            SessionState::PrescriptionInput => self.input_cycle(now, &pressed),
            SessionState::RateDisplay => self.rate_display_cycle(now, &pressed),
            SessionState::Monitoring => self.monitoring_cycle(now, &pressed),
            SessionState::Complete => self.complete_cycle(now, &pressed),
            SessionState::Terminated => {}
        }
        Ok(if self.state == SessionState::Terminated {
            TickStatus::Terminated
        } else {
            TickStatus::Running
        })
    }

    fn read_buttons(&mut self, now: u64) -> [bool; 4] {
        let mut pressed = [false; 4];
        for button in Button::ALL {
            let level = self.buttons.level(button);
            pressed[button.index()] = self.button_debounce.pressed(button, level, now);
        }
        pressed
    }

    fn set_state(&mut self, next: SessionState, now: u64) {
        if next != self.state {
            info!(from = ?self.state, to = ?next, "state change");
            self.state = next;
            self.state_entered_ms = now;
        }
    }

    fn init_cycle(&mut self, now: u64) {
        self.painter
            .paint_now(&display::boot(), now, self.surface.as_mut());
        self.leds.set(LedState::Off);
        self.buzzer.set_pattern(BuzzerPattern::Off);
        let mode = self.network.force_check(now, &self.uplink);
        info!(?mode, "startup connectivity check done");
        self.set_state(SessionState::PrescriptionInput, now);
    }

    fn input_cycle(&mut self, now: u64, pressed: &[bool; 4]) {
        if pressed[Button::New.index()] {
            self.entry = PrescriptionEntry::new(self.cfg.limits);
            self.entry_error = None;
        }
        while let Some(key) = self.keypad.next_key() {
            match self.entry.handle_key(key) {
                EntryOutcome::Editing | EntryOutcome::Advanced => {
                    self.entry_error = None;
                }
                EntryOutcome::Rejected(e) => {
                    debug!(error = %e, "prescription value rejected");
                    self.entry_error = Some(entry_hint(&e));
                }
                EntryOutcome::Complete(rx) => {
                    info!(
                        volume_ml = rx.target_volume_ml(),
                        duration_min = rx.duration_min(),
                        drip_factor = rx.drip_factor(),
                        "prescription confirmed"
                    );
                    self.prescription = Some(rx);
                    self.set_state(SessionState::RateDisplay, now);
                    return;
                }
            }
        }
        let frame = match &self.entry_error {
            Some(hint) => display::entry_invalid(self.entry.prompt(), hint, self.entry.footer()),
            None => display::entry(self.entry.prompt(), self.entry.buffer(), self.entry.footer()),
        };
        self.painter.paint_now(&frame, now, self.surface.as_mut());
        self.leds.set(LedState::Off);
        self.buzzer.set_pattern(BuzzerPattern::Off);
    }

    fn rate_display_cycle(&mut self, now: u64, pressed: &[bool; 4]) {
        if pressed[Button::New.index()] {
            self.full_reset(now);
            return;
        }
        let Some(rx) = self.prescription else {
            self.set_state(SessionState::PrescriptionInput, now);
            return;
        };
        self.painter
            .paint_now(&display::rate_summary(&rx), now, self.surface.as_mut());
        if now.saturating_sub(self.state_entered_ms) >= self.cfg.display.rate_display_ms {
            self.start_monitoring(now, rx);
        }
    }

    fn start_monitoring(&mut self, now: u64, rx: Prescription) {
        let mode = self.network.poll(now, &self.uplink);
        let mut dispatcher =
            NotificationDispatcher::new(self.cfg.notify, self.cfg.network.send_timeout_ms);
        dispatcher.session_started(
            rx.target_volume_ml(),
            rx.duration_min(),
            mode.is_online(),
            &self.uplink,
        );
        self.monitor = Some(MonitorContext::new(&self.cfg, now, dispatcher));
        self.painter.invalidate();
        self.set_state(SessionState::Monitoring, now);
    }

    fn monitoring_cycle(&mut self, now: u64, pressed: &[bool; 4]) {
        let Some(rx) = self.prescription else {
            self.set_state(SessionState::PrescriptionInput, now);
            return;
        };
        if pressed[Button::New.index()] {
            self.full_reset(now);
            return;
        }
        if pressed[Button::Cal.index()] {
            self.counters_reset(now);
            return;
        }
        if self.monitor.is_none() {
            self.set_state(SessionState::PrescriptionInput, now);
            return;
        }

        if let Some(message) = self.edges.take_fault() {
            if self.fault.is_none() {
                info!(%message, "sensor fault latched");
                self.fault = Some(message);
            }
        }

        let mode = self.network.poll(now, &self.uplink);
        let fault = self.fault.is_some();
        let cfg = self.cfg;

        // One consume per channel per tick.
        let drop_edge = self.edges.take_edge(Channel::Drop);
        let ir_edge = self.edges.take_edge(Channel::BubbleIr);
        let slot_edge = self.edges.take_edge(Channel::BubbleSlot);

        let (metrics, decision, pattern) = {
            let Some(ctx) = self.monitor.as_mut() else {
                return;
            };
            if let Some(ts) = drop_edge {
                if ctx.drop_debounce.accept(ts) {
                    ctx.drops.record(ts);
                }
            }
            if let Some(ts) = ir_edge {
                if ctx.ir_debounce.accept(ts) {
                    ctx.bubble.trigger_ir(ts);
                }
            }
            if let Some(ts) = slot_edge {
                if ctx.slot_debounce.accept(ts) {
                    ctx.bubble.trigger_slot(ts);
                }
            }
            ctx.drops.evict(now);
            ctx.bubble.poll(now);

            if pressed[Button::Ack.index()] {
                ctx.arbitrator.acknowledge();
                ctx.bubble.acknowledge();
            }

            let metrics = ctx.drops.metrics(&rx, now);
            let inputs = AlarmInputs {
                sensor_fault: fault,
                bubble_active: ctx.bubble.active(),
                ms_since_last_drop: metrics.ms_since_last_drop,
                no_flow_timeout_ms: cfg.detection.no_flow_timeout_ms,
                remaining_ml: metrics.remaining_ml,
                low_volume_ml: cfg.thresholds.low_volume_ml,
                percent: metrics.percent,
                elapsed_ms: now.saturating_sub(ctx.session_start_ms),
                duration_ms: rx.duration_ms(),
            };
            let decision = ctx.arbitrator.evaluate(&inputs);
            if decision.raised {
                info!(alarm = ?decision.active, "alarm raised");
            }

            ctx.dispatcher.on_cycle(
                &NotifyContext {
                    percent: metrics.percent,
                    delivered_ml: metrics.delivered_ml,
                    remaining_ml: metrics.remaining_ml,
                    target_volume_ml: rx.target_volume_ml(),
                    alarm: decision.active,
                    online: mode.is_online(),
                },
                &self.uplink,
            );
            (metrics, decision, ctx.arbitrator.buzzer_pattern())
        };

        let frame = match decision.active {
            Some(AlarmKind::SensorFault) => {
                display::sensor_fault(self.fault.as_deref().unwrap_or("Sensor error"))
            }
            Some(AlarmKind::Bubble) => display::bubble_alarm(mode),
            Some(AlarmKind::NoFlow) => display::no_flow(&metrics, &rx),
            Some(AlarmKind::TimeElapsed) => display::time_elapsed(&metrics, &rx),
            Some(AlarmKind::Complete) => display::complete(&metrics),
            Some(AlarmKind::LowVolume) | None => display::monitoring(&metrics, &rx, decision.active, mode),
        };
        if decision.raised {
            self.painter.paint_now(&frame, now, self.surface.as_mut());
        } else {
            self.painter.paint(&frame, now, self.surface.as_mut());
        }
        self.leds.set(led_for(
            decision.active,
            metrics.remaining_ml,
            cfg.thresholds.low_volume_ml,
            cfg.thresholds.warning_volume_ml,
        ));
        self.buzzer.set_pattern(pattern);

        if decision.active == Some(AlarmKind::Complete) {
            self.set_state(SessionState::Complete, now);
        }
    }

    fn complete_cycle(&mut self, now: u64, pressed: &[bool; 4]) {
        let Some(rx) = self.prescription else {
            self.set_state(SessionState::PrescriptionInput, now);
            return;
        };
        if pressed[Button::New.index()] {
            self.full_reset(now);
            return;
        }
        if pressed[Button::Cal.index()] {
            self.counters_reset(now);
            self.set_state(SessionState::Monitoring, now);
            return;
        }
        let mode = self.network.poll(now, &self.uplink);
        let (metrics, pattern) = {
            let Some(ctx) = self.monitor.as_mut() else {
                self.set_state(SessionState::PrescriptionInput, now);
                return;
            };
            if pressed[Button::Ack.index()] {
                ctx.arbitrator.acknowledge();
            }
            let metrics = ctx.drops.metrics(&rx, now);
            // Milestones missed while offline still go out if
            // connectivity returns after the bag finished.
            ctx.dispatcher.on_cycle(
                &NotifyContext {
                    percent: metrics.percent,
                    delivered_ml: metrics.delivered_ml,
                    remaining_ml: metrics.remaining_ml,
                    target_volume_ml: rx.target_volume_ml(),
                    alarm: ctx.arbitrator.active(),
                    online: mode.is_online(),
                },
                &self.uplink,
            );
            (metrics, ctx.arbitrator.buzzer_pattern())
        };
        self.painter
            .paint_now(&display::complete(&metrics), now, self.surface.as_mut());
        self.leds.set(LedState::Green);
        self.buzzer.set_pattern(pattern);
    }

    /// Full reset: back to prescription entry with nothing carried over
    /// except a latched sensor fault.
    fn full_reset(&mut self, now: u64) {
        info!("full reset requested");
        self.prescription = None;
        self.monitor = None;
        self.entry = PrescriptionEntry::new(self.cfg.limits);
        self.entry_error = None;
        self.painter.invalidate();
        self.buzzer.set_pattern(BuzzerPattern::Off);
        self.set_state(SessionState::PrescriptionInput, now);
    }

    /// Counters-only reset: keep the prescription, zero the delivery
    /// cycle, restart the session clock.
    fn counters_reset(&mut self, now: u64) {
        info!("counters reset, prescription kept");
        if let Some(ctx) = self.monitor.as_mut() {
            ctx.reset(now);
        }
        self.painter
            .paint_now(&display::counters_reset(), now, self.surface.as_mut());
        self.buzzer.set_pattern(BuzzerPattern::Off);
    }

    fn terminate(&mut self, now: u64) {
        info!("session terminated");
        self.buzzer.set_pattern(BuzzerPattern::Off);
        self.leds.set(LedState::Off);
        self.painter
            .paint_now(&display::terminated(), now, self.surface.as_mut());
        self.set_state(SessionState::Terminated, now);
    }
}

fn entry_hint(e: &ValidationError) -> String {
    match e {
        ValidationError::Volume(_, min, max) | ValidationError::Duration(_, min, max) => {
            format!("Invalid! {min}-{max}")
        }
        ValidationError::DripFactor(_, max) => format!("Invalid! 1-{max}"),
    }
}

/// Builder collecting the collaborators for a [`SessionCore`].
///
/// Every hardware seam must be provided; `build` fails fast on a missing
/// one instead of panicking later.
pub struct SessionBuilder<E: EdgeSource = Box<dyn EdgeSource>> {
    cfg: SessionCfg,
    clock: Box<dyn Clock>,
    edges: Option<E>,
    buttons: Option<Box<dyn ButtonPad>>,
    keypad: Option<Box<dyn Keypad>>,
    surface: Option<Box<dyn DisplaySurface>>,
    leds: Option<Box<dyn StatusLeds>>,
    buzzer: Option<Box<dyn Buzzer>>,
    transport: Option<Box<dyn Transport>>,
    stop: Option<Arc<AtomicBool>>,
}

impl<E: EdgeSource> SessionBuilder<E> {
    pub fn new(cfg: SessionCfg) -> Self {
        Self {
            cfg,
            clock: Box::new(ivmon_traits::MonotonicClock::new()),
            edges: None,
            buttons: None,
            keypad: None,
            surface: None,
            leds: None,
            buzzer: None,
            transport: None,
            stop: None,
        }
    }

    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn edges(mut self, edges: E) -> Self {
        self.edges = Some(edges);
        self
    }

    #[must_use]
    pub fn buttons(mut self, buttons: impl ButtonPad + 'static) -> Self {
        self.buttons = Some(Box::new(buttons));
        self
    }

    #[must_use]
    pub fn keypad(mut self, keypad: impl Keypad + 'static) -> Self {
        self.keypad = Some(Box::new(keypad));
        self
    }

    #[must_use]
    pub fn display(mut self, surface: impl DisplaySurface + 'static) -> Self {
        self.surface = Some(Box::new(surface));
        self
    }

    #[must_use]
    pub fn leds(mut self, leds: impl StatusLeds + 'static) -> Self {
        self.leds = Some(Box::new(leds));
        self
    }

    #[must_use]
    pub fn buzzer(mut self, buzzer: impl Buzzer + 'static) -> Self {
        self.buzzer = Some(Box::new(buzzer));
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// External termination flag, typically wired to Ctrl-C. Acts like a
    /// TERM press on the next tick.
    #[must_use]
    pub fn stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn build(self) -> Result<SessionCore<E>, BuildError> {
        if self.cfg.timing.tick_ms == 0 {
            return Err(BuildError::InvalidConfig("tick_ms must be positive"));
        }
        if self.cfg.network.probe_timeout_ms >= self.cfg.detection.no_flow_timeout_ms {
            return Err(BuildError::InvalidConfig(
                "probe timeout must stay below the no-flow timeout",
            ));
        }
        let edges = self.edges.ok_or(BuildError::MissingEdges)?;
        let buttons = self.buttons.ok_or(BuildError::MissingButtons)?;
        let keypad = self.keypad.ok_or(BuildError::MissingKeypad)?;
        let surface = self.surface.ok_or(BuildError::MissingDisplay)?;
        let leds = self.leds.ok_or(BuildError::MissingLeds)?;
        let buzzer = self.buzzer.ok_or(BuildError::MissingBuzzer)?;
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let epoch = self.clock.now();
        let cfg = self.cfg;
        Ok(SessionCore {
            uplink: Uplink::spawn(transport),
            clock: self.clock,
            epoch,
            edges,
            buttons,
            keypad,
            surface,
            leds,
            buzzer,
            stop: self.stop,
            state: SessionState::Init,
            state_entered_ms: 0,
            button_debounce: ButtonDebouncer::new(cfg.detection.button_debounce_ms),
            network: NetworkModeMonitor::new(cfg.network),
            painter: FramePainter::new(cfg.display.update_interval_ms),
            entry: PrescriptionEntry::new(cfg.limits),
            entry_error: None,
            prescription: None,
            monitor: None,
            fault: None,
            cfg,
        })
    }
}
