//! Device Layer
//!
//! Protocol adapters for the two device API generations and the dynamic
//! component model they share.
//!
//! # Components
//!
//! - [`Target`] / [`Generation`]: which device to poll and how
//! - [`ProtocolAdapter`]: uniform fetch-and-decode contract ([`Gen1Adapter`], [`Gen2Adapter`])
//! - [`DeviceConfig`] / [`discover_components`]: self-description and component enumeration
//! - Status records: [`SystemStatus`], [`WifiStatus`], [`SwitchStatus`],
//!   [`EnergyMeterStatus`], [`TemperatureStatus`]

mod adapter;
mod component;
mod gen1;
mod gen2;
mod status;
mod target;

pub use adapter::{AdapterError, AdapterSet, ProtocolAdapter};
pub use component::{Component, ComponentItem, ComponentKind, DeviceConfig, discover_components};
pub use gen1::Gen1Adapter;
pub use gen2::Gen2Adapter;
pub use status::{
    EnergyMeterStatus, Phase, PhaseReading, SwitchStatus, SystemStatus, TemperatureStatus,
    TotalReading, WifiStatus,
};
pub use target::{Generation, Target};

#[cfg(test)]
pub(crate) use gen2::fixtures as gen2_fixtures;
