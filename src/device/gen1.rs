//! Gen1 adapter: REST endpoints (`/settings`, `/status`, `/relay/<id>`, `/meter/<id>`).
//!
//! Gen1 devices do not publish a component-keyed configuration. The adapter
//! synthesizes one from `/settings` so that discovery works the same way for
//! both generations: `relays[i]` becomes `switch:<i>` and each
//! `ext_temperature` key `k` becomes `temperature:<k>`.
//!
//! System, wifi and temperature readings all come from `/status`. The adapter
//! fetches it once per pass and serves every reading from that copy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::cache::{CacheKey, DocumentKind, StatusCache};
use crate::device::adapter::{AdapterError, ProtocolAdapter, decode};
use crate::device::component::{ComponentItem, ComponentKind, DeviceConfig};
use crate::device::status::{
    EnergyMeterStatus, SwitchStatus, SystemStatus, TemperatureStatus, WifiStatus,
};
use crate::device::target::{Generation, Target};
use crate::transport::{Transport, TransportError};

const SETTINGS_PATH: &str = "/settings";
const STATUS_PATH: &str = "/status";

/// Upper bound on reusing `/status` when a pass ends without `finish_pass`.
const STATUS_REUSE_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default)]
    relays: Vec<RelaySettings>,
    #[serde(default)]
    ext_temperature: IndexMap<String, IgnoredAny>,
}

#[derive(Debug, Deserialize)]
struct RelaySettings {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SysStatus {
    unixtime: i64,
    uptime: u64,
    ram_total: u64,
    ram_free: u64,
    fs_size: u64,
    fs_free: u64,
}

#[derive(Debug, Deserialize)]
struct WifiStatusEnvelope {
    wifi_sta: WifiSta,
}

#[derive(Debug, Deserialize)]
struct WifiSta {
    #[serde(default)]
    ssid: Option<String>,
    #[serde(default)]
    rssi: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExtTemperatureEnvelope {
    #[serde(default)]
    ext_temperature: HashMap<String, ExtTemperature>,
}

#[derive(Debug, Deserialize)]
struct ExtTemperature {
    #[serde(rename = "tC", default)]
    t_c: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RelayStatus {
    ison: bool,
    // absent on older firmware
    #[serde(default)]
    source: String,
}

#[derive(Debug, Deserialize)]
struct MeterStatus {
    power: f64,
}

/// Adapter for Gen1 (REST) devices.
pub struct Gen1Adapter {
    transport: Arc<dyn Transport>,
    status: StatusCache<Arc<[u8]>>,
}

impl Gen1Adapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            status: StatusCache::new(),
        }
    }

    fn status_key(target: &Target) -> CacheKey {
        CacheKey::new(&target.address, DocumentKind::Status)
    }

    /// Raw `/status` document, shared by all readings of the current pass.
    async fn status_document(&self, target: &Target) -> Result<Arc<[u8]>, AdapterError> {
        let key = Self::status_key(target);
        if let Some(payload) = self.status.get(&key) {
            return Ok(payload);
        }

        let payload: Arc<[u8]> = self.get(target, STATUS_PATH).await?.into();
        self.status.set(key, Arc::clone(&payload), STATUS_REUSE_TTL);
        Ok(payload)
    }

    async fn get(&self, target: &Target, path: &str) -> Result<Vec<u8>, AdapterError> {
        Ok(self.transport.get(target, path).await?)
    }

    /// Active power of meter `id`, or `None` for relays without metering.
    async fn fetch_meter_power(&self, target: &Target, id: u32) -> Result<Option<f64>, AdapterError> {
        let path = format!("/meter/{id}");
        match self.transport.get(target, &path).await {
            Ok(payload) => Ok(Some(decode::<MeterStatus>("meter", &payload)?.power)),
            Err(TransportError::Status(404)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Build the component-keyed configuration from Gen1 `/settings`.
fn synthesize_config(settings: Settings) -> Result<DeviceConfig, serde_json::Error> {
    let mut config = DeviceConfig::default();

    for (index, relay) in settings.relays.into_iter().enumerate() {
        let item = ComponentItem {
            id: index as u32,
            name: relay.name.unwrap_or_default(),
        };
        config.insert(format!("{}{}", ComponentKind::Switch.key_prefix(), index), &item)?;
    }

    for key in settings.ext_temperature.keys() {
        let Ok(id) = key.parse::<u32>() else {
            tracing::debug!(key = %key, "Ignoring non-numeric ext_temperature key");
            continue;
        };
        let item = ComponentItem {
            id,
            name: format!("ext_temperature:{id}"),
        };
        config.insert(format!("{}{}", ComponentKind::Temperature.key_prefix(), id), &item)?;
    }

    Ok(config)
}

#[async_trait::async_trait]
impl ProtocolAdapter for Gen1Adapter {
    fn generation(&self) -> Generation {
        Generation::Gen1
    }

    async fn fetch_config(&self, target: &Target) -> Result<DeviceConfig, AdapterError> {
        let payload = self.get(target, SETTINGS_PATH).await?;
        let settings: Settings = decode("settings", &payload)?;
        synthesize_config(settings).map_err(|source| AdapterError::Decode {
            document: "settings".to_string(),
            source,
        })
    }

    async fn fetch_system_status(&self, target: &Target) -> Result<SystemStatus, AdapterError> {
        let payload = self.status_document(target).await?;
        let status: SysStatus = decode("status", &payload)?;
        Ok(SystemStatus {
            // Gen1 reports 0 until the clock is synchronized.
            unixtime: (status.unixtime > 0).then_some(status.unixtime),
            uptime: status.uptime,
            ram_total: status.ram_total,
            ram_free: status.ram_free,
            fs_size: status.fs_size,
            fs_free: status.fs_free,
            restart_required: None,
        })
    }

    async fn fetch_wifi_status(&self, target: &Target) -> Result<WifiStatus, AdapterError> {
        let payload = self.status_document(target).await?;
        let envelope: WifiStatusEnvelope = decode("status", &payload)?;
        Ok(WifiStatus {
            ssid: envelope.wifi_sta.ssid,
            rssi: envelope.wifi_sta.rssi,
        })
    }

    async fn fetch_switch_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<SwitchStatus, AdapterError> {
        let payload = self.get(target, &format!("/relay/{id}")).await?;
        let relay: RelayStatus = decode("relay", &payload)?;
        let active_power = self.fetch_meter_power(target, id).await?;

        Ok(SwitchStatus {
            output: relay.ison,
            source: relay.source,
            current: None,
            active_power,
        })
    }

    fn finish_pass(&self, target: &Target) {
        self.status.invalidate(&Self::status_key(target));
    }

    async fn fetch_energy_meter_status(
        &self,
        _target: &Target,
        _id: u32,
    ) -> Result<EnergyMeterStatus, AdapterError> {
        Err(AdapterError::Unsupported {
            generation: Generation::Gen1,
            operation: "energy meter status",
        })
    }

    async fn fetch_temperature_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<TemperatureStatus, AdapterError> {
        let payload = self.status_document(target).await?;
        let envelope: ExtTemperatureEnvelope = decode("status", &payload)?;
        let sensor = envelope
            .ext_temperature
            .get(&id.to_string())
            .ok_or_else(|| AdapterError::MissingComponent {
                document: "status.ext_temperature".to_string(),
                id,
            })?;

        Ok(TemperatureStatus {
            celsius: sensor.t_c,
        })
    }
}
