//! Outbound notification dedup and dispatch.
//!
//! Every message the session can send maps to one enum variant with a
//! one-shot flag, so a condition that stays true across many cycles is
//! reported exactly once per session. A failed send still marks the
//! flag: the condition was already surfaced locally, and retrying a
//! stale report adds noise, not safety. Offline the flag is left unset
//! unless the catch-up policy says otherwise; catch-up only reaches the
//! kinds re-evaluated by `on_cycle`, so `Started` (attempted once, at
//! monitoring start) never catches up.

use crate::alarm::AlarmKind;
use crate::config::NotifyCfg;
use crate::uplink::Uplink;
use tracing::{info, warn};

/// Everything the session notifies about, one flag slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Started,
    Quarter,
    Half,
    Full,
    LowVolume,
    Bubble,
    NoFlow,
    TimeElapsed,
}

impl NotificationKind {
    pub const ALL: [Self; 8] = [
        Self::Started,
        Self::Quarter,
        Self::Half,
        Self::Full,
        Self::LowVolume,
        Self::Bubble,
        Self::NoFlow,
        Self::TimeElapsed,
    ];

    fn index(self) -> usize {
        match self {
            Self::Started => 0,
            Self::Quarter => 1,
            Self::Half => 2,
            Self::Full => 3,
            Self::LowVolume => 4,
            Self::Bubble => 5,
            Self::NoFlow => 6,
            Self::TimeElapsed => 7,
        }
    }
}

/// Fixed-size one-shot flag set, indexed by [`NotificationKind`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationFlags([bool; NotificationKind::ALL.len()]);

impl NotificationFlags {
    pub fn is_set(&self, kind: NotificationKind) -> bool {
        self.0[kind.index()]
    }

    pub fn set(&mut self, kind: NotificationKind) {
        self.0[kind.index()] = true;
    }

    pub fn clear_all(&mut self) {
        self.0 = Default::default();
    }
}

/// Per-cycle facts the dispatcher derives messages from.
#[derive(Debug, Clone, Copy)]
pub struct NotifyContext {
    pub percent: f32,
    pub delivered_ml: f32,
    pub remaining_ml: f32,
    pub target_volume_ml: u32,
    pub alarm: Option<AlarmKind>,
    pub online: bool,
}

/// Owns the flags and the send policy for one session.
#[derive(Debug)]
pub struct NotificationDispatcher {
    cfg: NotifyCfg,
    send_timeout_ms: u64,
    flags: NotificationFlags,
}

impl NotificationDispatcher {
    pub fn new(cfg: NotifyCfg, send_timeout_ms: u64) -> Self {
        Self {
            cfg,
            send_timeout_ms,
            flags: NotificationFlags::default(),
        }
    }

    pub fn flags(&self) -> &NotificationFlags {
        &self.flags
    }

    /// All flags are cleared on both full and counters-only resets, so
    /// the new delivery cycle reports its own milestones.
    pub fn reset(&mut self) {
        self.flags.clear_all();
    }

    /// Announce that monitoring began for this prescription. Attempted
    /// exactly once; an offline start is not caught up later.
    pub fn session_started(
        &mut self,
        target_volume_ml: u32,
        duration_min: u32,
        online: bool,
        uplink: &Uplink,
    ) {
        let message = format!(
            "IV monitoring started: {target_volume_ml}mL over {duration_min}min (0% delivered)"
        );
        self.dispatch(NotificationKind::Started, &message, online, uplink);
    }

    /// Evaluate all milestone and alarm notifications due this cycle.
    pub fn on_cycle(&mut self, ctx: &NotifyContext, uplink: &Uplink) {
        if ctx.percent >= 25.0 {
            self.dispatch(NotificationKind::Quarter, "IV delivered 25%.", ctx.online, uplink);
        }
        if ctx.percent >= 50.0 {
            self.dispatch(NotificationKind::Half, "IV delivered 50%.", ctx.online, uplink);
        }
        if ctx.percent >= 100.0 {
            self.dispatch(NotificationKind::Full, "IV delivered 100%.", ctx.online, uplink);
        }
        match ctx.alarm {
            Some(AlarmKind::LowVolume) => {
                let message = format!("IV low volume ({} mL).", ctx.remaining_ml as u32);
                self.dispatch(NotificationKind::LowVolume, &message, ctx.online, uplink);
            }
            Some(AlarmKind::Bubble) => {
                self.dispatch(
                    NotificationKind::Bubble,
                    "BUBBLE DETECTED - CHECK IV LINE",
                    ctx.online,
                    uplink,
                );
            }
            Some(AlarmKind::NoFlow) => {
                let message = format!(
                    "NO FLOW - Check IV line ({} mL delivered)",
                    ctx.delivered_ml as u32
                );
                self.dispatch(NotificationKind::NoFlow, &message, ctx.online, uplink);
            }
            Some(AlarmKind::TimeElapsed) => {
                let message = format!(
                    "TIME ELAPSED - Volume incomplete: {}mL/{}mL",
                    ctx.delivered_ml as u32, ctx.target_volume_ml
                );
                self.dispatch(NotificationKind::TimeElapsed, &message, ctx.online, uplink);
            }
            Some(AlarmKind::SensorFault | AlarmKind::Complete) | None => {}
        }
    }

    fn dispatch(&mut self, kind: NotificationKind, message: &str, online: bool, uplink: &Uplink) {
        if self.flags.is_set(kind) {
            return;
        }
        if !online {
            if self.cfg.mark_sent_when_offline {
                self.flags.set(kind);
            }
            return;
        }
        match uplink.send(message, self.send_timeout_ms) {
            Ok(()) => info!(?kind, "notification sent"),
            // Already marked: the condition was reported locally and a
            // retry against the same stale condition is unwanted.
            Err(e) => warn!(?kind, error = %e, "notification send failed"),
        }
        self.flags.set(kind);
    }
}
