use thiserror::Error;

/// Runtime errors surfaced by the session core.
///
/// None of these are fatal to the monitoring loop: transport and timeout
/// errors are logged at the boundary, sensor faults become the
/// highest-priority alarm, and only the TERM button ends the session.
#[derive(Debug, Error, Clone)]
pub enum MonitorError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout waiting for uplink")]
    Timeout,
    #[error("sensor fault: {0}")]
    SensorFault(String),
    #[error("invalid state: {0}")]
    State(String),
}

/// Malformed prescription input. Recovered locally by re-prompting the
/// operator; never propagated out of the input state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("volume {0} mL out of range {1}-{2}")]
    Volume(u32, u32, u32),
    #[error("duration {0} min out of range {1}-{2}")]
    Duration(u32, u32, u32),
    #[error("drip factor {0} out of range 1-{1}")]
    DripFactor(u32, u32),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing edge source")]
    MissingEdges,
    #[error("missing transport")]
    MissingTransport,
    #[error("missing keypad")]
    MissingKeypad,
    #[error("missing button pad")]
    MissingButtons,
    #[error("missing display")]
    MissingDisplay,
    #[error("missing status LEDs")]
    MissingLeds,
    #[error("missing buzzer")]
    MissingBuzzer,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
