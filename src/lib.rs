use std::time::{SystemTime, UNIX_EPOCH};

pub mod agent;
pub mod buf;
pub mod codec;
pub mod error;
pub mod exporter;

pub use agent::{Agent, AgentConfig, AgentState, Recorder};
pub use error::{EncodeError, RecordError};
pub use exporter::{HttpTransport, InMemTransport, Transport};

pub type StatName = String;
/// Unix seconds
pub type Time = u64;

pub fn now() -> Time {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// One data point submitted by producer code.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Counter {
        name: StatName,
        delta: i64,
        time: Time,
    },
    Gauge {
        name: StatName,
        value: f64,
        time: Time,
    },
}
impl Observation {
    pub fn counter(name: impl Into<StatName>, delta: i64) -> Self {
        Self::counter_at(name, delta, now())
    }
    pub fn counter_at(name: impl Into<StatName>, delta: i64, time: Time) -> Self {
        Self::Counter {
            name: name.into(),
            delta,
            time,
        }
    }
    pub fn gauge(name: impl Into<StatName>, value: f64) -> Self {
        Self::gauge_at(name, value, now())
    }
    pub fn gauge_at(name: impl Into<StatName>, value: f64, time: Time) -> Self {
        Self::Gauge {
            name: name.into(),
            value,
            time,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Counter { name, .. } | Self::Gauge { name, .. } => name,
        }
    }
}
