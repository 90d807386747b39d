//! Uniform fetch-and-decode contract implemented once per device generation.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::device::component::DeviceConfig;
use crate::device::gen1::Gen1Adapter;
use crate::device::gen2::Gen2Adapter;
use crate::device::status::{
    EnergyMeterStatus, SwitchStatus, SystemStatus, TemperatureStatus, WifiStatus,
};
use crate::device::target::{Generation, Target};
use crate::transport::{Transport, TransportError};

/// Errors raised by a protocol adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The document could not be fetched.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The document does not match the expected schema.
    #[error("failed to decode {document}: {source}")]
    Decode {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    /// The document decoded but lacks the requested component.
    #[error("{document} has no entry for component {id}")]
    MissingComponent { document: String, id: u32 },

    /// The generation has no such operation.
    #[error("{operation} is not supported by {generation} devices")]
    Unsupported {
        generation: Generation,
        operation: &'static str,
    },
}

impl AdapterError {
    /// True if the device could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// True if the device no longer knows the requested component.
    pub fn is_missing_component(&self) -> bool {
        matches!(
            self,
            Self::MissingComponent { .. } | Self::Transport(TransportError::Status(404))
        )
    }
}

/// Decode `payload` into `T`, naming `document` in the error.
pub(crate) fn decode<T: DeserializeOwned>(document: &str, payload: &[u8]) -> Result<T, AdapterError> {
    serde_json::from_slice(payload).map_err(|source| AdapterError::Decode {
        document: document.to_string(),
        source,
    })
}

/// Generation-specific request shapes and response schemas.
#[async_trait::async_trait]
pub trait ProtocolAdapter: Send + Sync + 'static {
    /// Generation served by this adapter.
    fn generation(&self) -> Generation;

    /// Fetch the device's self-description.
    async fn fetch_config(&self, target: &Target) -> Result<DeviceConfig, AdapterError>;

    /// Fetch target-level system status.
    async fn fetch_system_status(&self, target: &Target) -> Result<SystemStatus, AdapterError>;

    /// Fetch target-level wifi status.
    async fn fetch_wifi_status(&self, target: &Target) -> Result<WifiStatus, AdapterError>;

    /// Fetch the status of switch `id`.
    async fn fetch_switch_status(&self, target: &Target, id: u32)
    -> Result<SwitchStatus, AdapterError>;

    /// Fetch the status of energy meter `id` (phases A, B, C and total).
    async fn fetch_energy_meter_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<EnergyMeterStatus, AdapterError>;

    /// Fetch the status of temperature sensor `id`.
    async fn fetch_temperature_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<TemperatureStatus, AdapterError>;

    /// Release documents kept for the pass over `target` that just ended.
    fn finish_pass(&self, _target: &Target) {}
}

/// One adapter per generation, sharing a transport.
#[derive(Clone)]
pub struct AdapterSet {
    gen1: Arc<Gen1Adapter>,
    gen2: Arc<Gen2Adapter>,
}

impl AdapterSet {
    /// Build both adapters on top of `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            gen1: Arc::new(Gen1Adapter::new(Arc::clone(&transport))),
            gen2: Arc::new(Gen2Adapter::new(transport)),
        }
    }

    /// Adapter for `generation`.
    pub fn for_generation(&self, generation: Generation) -> &dyn ProtocolAdapter {
        match generation {
            Generation::Gen1 => self.gen1.as_ref(),
            Generation::Gen2 => self.gen2.as_ref(),
        }
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet").finish_non_exhaustive()
    }
}
