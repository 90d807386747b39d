//! Generation-independent status records.
//!
//! Adapters decode their wire formats into these records. Optional fields are
//! values a device may legitimately omit; the collector emits no sample for them.

/// Target-level system status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemStatus {
    /// Device clock, absent until time is synchronized.
    pub unixtime: Option<i64>,
    /// Seconds since boot.
    pub uptime: u64,
    pub ram_total: u64,
    pub ram_free: u64,
    pub fs_size: u64,
    pub fs_free: u64,
    /// Pending configuration change needs a reboot (Gen2 only).
    pub restart_required: Option<bool>,
}

/// Target-level wifi station status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WifiStatus {
    pub ssid: Option<String>,
    /// Signal strength in dBm, absent while disconnected.
    pub rssi: Option<f64>,
}

/// Relay output status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchStatus {
    pub output: bool,
    /// What last changed the output (`button`, `schedule`, `cloud`, ...).
    pub source: String,
    /// Instantaneous current in A.
    pub current: Option<f64>,
    /// Active power in W.
    pub active_power: Option<f64>,
}

/// Readings of one energy-meter phase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhaseReading {
    pub current: f64,
    pub apparent_power: f64,
    pub active_power: f64,
    pub power_factor: f64,
    pub frequency: f64,
    pub voltage: f64,
}

/// Aggregate over all phases of an energy meter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TotalReading {
    pub current: f64,
    pub active_power: f64,
}

/// Electrical phase of an energy meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

/// Three-phase energy-meter status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergyMeterStatus {
    pub a: PhaseReading,
    pub b: PhaseReading,
    pub c: PhaseReading,
    pub total: TotalReading,
}

impl EnergyMeterStatus {
    /// Readings of `phase`.
    pub fn phase(&self, phase: Phase) -> &PhaseReading {
        match phase {
            Phase::A => &self.a,
            Phase::B => &self.b,
            Phase::C => &self.c,
        }
    }
}

/// Temperature sensor status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemperatureStatus {
    /// Degrees Celsius, absent when the probe is disconnected.
    pub celsius: Option<f64>,
}
