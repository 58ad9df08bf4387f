//! Connectivity mode tracking.
//!
//! The session runs identically online and offline; the only difference
//! is whether notifications go out. Reachability is probed on a fixed
//! cadence through the bounded uplink, and any failed or overdue probe
//! reads as local-only.

use crate::config::NetworkCfg;
use crate::uplink::Uplink;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    Online,
    LocalOnly,
}

impl NetworkMode {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Tracks the current mode and rechecks it on the configured cadence.
#[derive(Debug)]
pub struct NetworkModeMonitor {
    cfg: NetworkCfg,
    mode: NetworkMode,
    last_check_ms: Option<u64>,
}

impl NetworkModeMonitor {
    pub fn new(cfg: NetworkCfg) -> Self {
        Self {
            cfg,
            mode: NetworkMode::LocalOnly,
            last_check_ms: None,
        }
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    /// Probe immediately, ignoring the cadence. Used at session start so
    /// the first status line reflects reality.
    pub fn force_check(&mut self, now_ms: u64, uplink: &Uplink) -> NetworkMode {
        self.last_check_ms = Some(now_ms);
        self.apply(uplink.probe(self.cfg.probe_timeout_ms));
        self.mode
    }

    /// Recheck if the cadence interval has elapsed; otherwise keep the
    /// current mode.
    pub fn poll(&mut self, now_ms: u64, uplink: &Uplink) -> NetworkMode {
        let due = match self.last_check_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.cfg.recheck_ms,
        };
        if due {
            self.force_check(now_ms, uplink);
        }
        self.mode
    }

    fn apply(&mut self, reachable: bool) {
        let next = if reachable {
            NetworkMode::Online
        } else {
            NetworkMode::LocalOnly
        };
        if next != self.mode {
            info!(from = ?self.mode, to = ?next, "network mode changed");
            self.mode = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTransport;

    fn monitor() -> NetworkModeMonitor {
        NetworkModeMonitor::new(NetworkCfg {
            recheck_ms: 60_000,
            probe_timeout_ms: 1_000,
            send_timeout_ms: 1_000,
        })
    }

    #[test]
    fn starts_local_only_until_checked() {
        assert_eq!(monitor().mode(), NetworkMode::LocalOnly);
    }

    #[test]
    fn force_check_goes_online() {
        let uplink = Uplink::spawn(Box::new(MockTransport::online()));
        let mut m = monitor();
        assert_eq!(m.force_check(0, &uplink), NetworkMode::Online);
    }

    #[test]
    fn poll_respects_cadence() {
        let transport = MockTransport::online();
        let probes = transport.probe_count();
        let uplink = Uplink::spawn(Box::new(transport));
        let mut m = monitor();
        m.force_check(0, &uplink);
        // Within the interval nothing is probed.
        m.poll(30_000, &uplink);
        assert_eq!(probes.load(std::sync::atomic::Ordering::SeqCst), 1);
        // Past the interval a fresh probe runs.
        m.poll(60_000, &uplink);
        assert_eq!(probes.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_probe_drops_to_local_only() {
        let transport = MockTransport::online();
        let online_flag = transport.online_flag();
        let uplink = Uplink::spawn(Box::new(transport));
        let mut m = monitor();
        m.force_check(0, &uplink);
        assert_eq!(m.mode(), NetworkMode::Online);
        online_flag.store(false, std::sync::atomic::Ordering::SeqCst);
        m.poll(60_000, &uplink);
        assert_eq!(m.mode(), NetworkMode::LocalOnly);
    }
}
