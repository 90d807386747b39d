//! Gen2 adapter: JSON-RPC over HTTP GET (`/rpc/<Component>.<Method>`).

use std::sync::Arc;

use serde::Deserialize;

use crate::device::adapter::{AdapterError, ProtocolAdapter, decode};
use crate::device::component::DeviceConfig;
use crate::device::status::{
    EnergyMeterStatus, PhaseReading, SwitchStatus, SystemStatus, TemperatureStatus, TotalReading,
    WifiStatus,
};
use crate::device::target::{Generation, Target};
use crate::transport::Transport;

const CONFIG_METHOD: &str = "Shelly.GetConfig";
const SYS_METHOD: &str = "Sys.GetStatus";
const WIFI_METHOD: &str = "Wifi.GetStatus";
const SWITCH_METHOD: &str = "Switch.GetStatus";
const EM_METHOD: &str = "EM.GetStatus";
const TEMPERATURE_METHOD: &str = "Temperature.GetStatus";

fn rpc_path(method: &str) -> String {
    format!("/rpc/{method}")
}

fn rpc_path_with_id(method: &str, id: u32) -> String {
    format!("/rpc/{method}?id={id}")
}

#[derive(Debug, Deserialize)]
struct SysStatus {
    unixtime: Option<i64>,
    uptime: u64,
    ram_size: u64,
    ram_free: u64,
    fs_size: u64,
    fs_free: u64,
    restart_required: bool,
}

#[derive(Debug, Deserialize)]
struct WifiStatusRecord {
    #[serde(default)]
    ssid: Option<String>,
    #[serde(default)]
    rssi: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SwitchStatusRecord {
    output: bool,
    source: String,
    #[serde(default)]
    current: Option<f64>,
    #[serde(default)]
    apower: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EmStatus {
    a_current: f64,
    a_voltage: f64,
    a_act_power: f64,
    a_aprt_power: f64,
    a_pf: f64,
    a_freq: f64,
    b_current: f64,
    b_voltage: f64,
    b_act_power: f64,
    b_aprt_power: f64,
    b_pf: f64,
    b_freq: f64,
    c_current: f64,
    c_voltage: f64,
    c_act_power: f64,
    c_aprt_power: f64,
    c_pf: f64,
    c_freq: f64,
    total_current: f64,
    total_act_power: f64,
}

#[derive(Debug, Deserialize)]
struct TemperatureStatusRecord {
    #[serde(rename = "tC", default)]
    t_c: Option<f64>,
}

impl From<SysStatus> for SystemStatus {
    fn from(s: SysStatus) -> Self {
        Self {
            unixtime: s.unixtime,
            uptime: s.uptime,
            ram_total: s.ram_size,
            ram_free: s.ram_free,
            fs_size: s.fs_size,
            fs_free: s.fs_free,
            restart_required: Some(s.restart_required),
        }
    }
}

impl From<EmStatus> for EnergyMeterStatus {
    fn from(s: EmStatus) -> Self {
        Self {
            a: PhaseReading {
                current: s.a_current,
                apparent_power: s.a_aprt_power,
                active_power: s.a_act_power,
                power_factor: s.a_pf,
                frequency: s.a_freq,
                voltage: s.a_voltage,
            },
            b: PhaseReading {
                current: s.b_current,
                apparent_power: s.b_aprt_power,
                active_power: s.b_act_power,
                power_factor: s.b_pf,
                frequency: s.b_freq,
                voltage: s.b_voltage,
            },
            c: PhaseReading {
                current: s.c_current,
                apparent_power: s.c_aprt_power,
                active_power: s.c_act_power,
                power_factor: s.c_pf,
                frequency: s.c_freq,
                voltage: s.c_voltage,
            },
            total: TotalReading {
                current: s.total_current,
                active_power: s.total_act_power,
            },
        }
    }
}

/// Adapter for Gen2 (RPC) devices.
pub struct Gen2Adapter {
    transport: Arc<dyn Transport>,
}

impl Gen2Adapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call(&self, target: &Target, path: &str) -> Result<Vec<u8>, AdapterError> {
        Ok(self.transport.get(target, path).await?)
    }
}

#[async_trait::async_trait]
impl ProtocolAdapter for Gen2Adapter {
    fn generation(&self) -> Generation {
        Generation::Gen2
    }

    async fn fetch_config(&self, target: &Target) -> Result<DeviceConfig, AdapterError> {
        let payload = self.call(target, &rpc_path(CONFIG_METHOD)).await?;
        DeviceConfig::from_slice(&payload).map_err(|source| AdapterError::Decode {
            document: CONFIG_METHOD.to_string(),
            source,
        })
    }

    async fn fetch_system_status(&self, target: &Target) -> Result<SystemStatus, AdapterError> {
        let payload = self.call(target, &rpc_path(SYS_METHOD)).await?;
        Ok(decode::<SysStatus>(SYS_METHOD, &payload)?.into())
    }

    async fn fetch_wifi_status(&self, target: &Target) -> Result<WifiStatus, AdapterError> {
        let payload = self.call(target, &rpc_path(WIFI_METHOD)).await?;
        let record: WifiStatusRecord = decode(WIFI_METHOD, &payload)?;
        Ok(WifiStatus {
            ssid: record.ssid,
            rssi: record.rssi,
        })
    }

    async fn fetch_switch_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<SwitchStatus, AdapterError> {
        let payload = self.call(target, &rpc_path_with_id(SWITCH_METHOD, id)).await?;
        let record: SwitchStatusRecord = decode(SWITCH_METHOD, &payload)?;
        Ok(SwitchStatus {
            output: record.output,
            source: record.source,
            current: record.current,
            active_power: record.apower,
        })
    }

    async fn fetch_energy_meter_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<EnergyMeterStatus, AdapterError> {
        let payload = self.call(target, &rpc_path_with_id(EM_METHOD, id)).await?;
        Ok(decode::<EmStatus>(EM_METHOD, &payload)?.into())
    }

    async fn fetch_temperature_status(
        &self,
        target: &Target,
        id: u32,
    ) -> Result<TemperatureStatus, AdapterError> {
        let payload = self
            .call(target, &rpc_path_with_id(TEMPERATURE_METHOD, id))
            .await?;
        let record: TemperatureStatusRecord = decode(TEMPERATURE_METHOD, &payload)?;
        Ok(TemperatureStatus {
            celsius: record.t_c,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn target() -> Target {
        Target::new("192.168.1.20", Generation::Gen2)
    }

    fn adapter(transport: MockTransport) -> Gen2Adapter {
        Gen2Adapter::new(Arc::new(transport))
    }

    #[test]
    fn test_rpc_paths() {
        assert_eq!(rpc_path(CONFIG_METHOD), "/rpc/Shelly.GetConfig");
        assert_eq!(
            rpc_path_with_id(SWITCH_METHOD, 3),
            "/rpc/Switch.GetStatus?id=3"
        );
    }

    #[tokio::test]
    async fn test_fetch_config() {
        let adapter = adapter(MockTransport::new().route("/rpc/Shelly.GetConfig", fixtures::CONFIG));
        let config = adapter.fetch_config(&target()).await.unwrap();
        assert_eq!(config.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_config_not_an_object() {
        let adapter = adapter(MockTransport::new().route("/rpc/Shelly.GetConfig", "[]"));
        let err = adapter.fetch_config(&target()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_fetch_system_status() {
        let adapter = adapter(MockTransport::new().route("/rpc/Sys.GetStatus", fixtures::SYS));
        let status = adapter.fetch_system_status(&target()).await.unwrap();
        assert_eq!(status.unixtime, Some(1_700_000_000));
        assert_eq!(status.uptime, 3600);
        assert_eq!(status.ram_total, 260_000);
        assert_eq!(status.fs_free, 200_000);
        assert_eq!(status.restart_required, Some(false));
    }

    #[tokio::test]
    async fn test_fetch_system_status_before_time_sync() {
        let body = r#"{"restart_required": true, "unixtime": null, "uptime": 5,
            "ram_size": 1, "ram_free": 1, "fs_size": 1, "fs_free": 1}"#;
        let adapter = adapter(MockTransport::new().route("/rpc/Sys.GetStatus", body));
        let status = adapter.fetch_system_status(&target()).await.unwrap();
        assert_eq!(status.unixtime, None);
        assert_eq!(status.restart_required, Some(true));
    }

    #[tokio::test]
    async fn test_fetch_system_status_rejects_wrong_shape() {
        let body = r#"{"uptime": "long", "ram_size": 1, "ram_free": 1, "fs_size": 1, "fs_free": 1, "restart_required": false}"#;
        let adapter = adapter(MockTransport::new().route("/rpc/Sys.GetStatus", body));
        let err = adapter.fetch_system_status(&target()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_fetch_wifi_status() {
        let adapter = adapter(MockTransport::new().route("/rpc/Wifi.GetStatus", fixtures::WIFI));
        let status = adapter.fetch_wifi_status(&target()).await.unwrap();
        assert_eq!(status.ssid.as_deref(), Some("home"));
        assert_eq!(status.rssi, Some(-58.0));
    }

    #[tokio::test]
    async fn test_fetch_wifi_status_disconnected() {
        let body = r#"{"sta_ip": null, "status": "disconnected"}"#;
        let adapter = adapter(MockTransport::new().route("/rpc/Wifi.GetStatus", body));
        let status = adapter.fetch_wifi_status(&target()).await.unwrap();
        assert_eq!(status, WifiStatus::default());
    }

    #[tokio::test]
    async fn test_fetch_switch_status() {
        let adapter =
            adapter(MockTransport::new().route("/rpc/Switch.GetStatus?id=0", fixtures::SWITCH));
        let status = adapter.fetch_switch_status(&target(), 0).await.unwrap();
        assert!(status.output);
        assert_eq!(status.source, "schedule");
        assert_eq!(status.current, Some(0.5));
        assert_eq!(status.active_power, Some(110.0));
    }

    #[tokio::test]
    async fn test_fetch_switch_status_missing_output() {
        let adapter = adapter(
            MockTransport::new().route("/rpc/Switch.GetStatus?id=0", r#"{"id": 0, "source": "init"}"#),
        );
        let err = adapter.fetch_switch_status(&target(), 0).await.unwrap_err();
        assert!(matches!(err, AdapterError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_fetch_energy_meter_status() {
        let adapter = adapter(MockTransport::new().route("/rpc/EM.GetStatus?id=1", fixtures::EM));
        let status = adapter.fetch_energy_meter_status(&target(), 1).await.unwrap();
        assert_eq!(status.a.current, 1.1);
        assert_eq!(status.b.apparent_power, 350.0);
        assert_eq!(status.c.frequency, 50.1);
        assert_eq!(status.total.current, 6.3);
        assert_eq!(status.total.active_power, 900.0);
    }

    #[tokio::test]
    async fn test_fetch_temperature_status() {
        let adapter = adapter(
            MockTransport::new().route("/rpc/Temperature.GetStatus?id=100", fixtures::TEMPERATURE),
        );
        let status = adapter.fetch_temperature_status(&target(), 100).await.unwrap();
        assert_eq!(status.celsius, Some(21.5));
    }

    #[tokio::test]
    async fn test_fetch_temperature_status_sensor_unplugged() {
        let adapter = adapter(
            MockTransport::new()
                .route("/rpc/Temperature.GetStatus?id=100", r#"{"id": 100, "tC": null, "tF": null}"#),
        );
        let status = adapter.fetch_temperature_status(&target(), 100).await.unwrap();
        assert_eq!(status.celsius, None);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let adapter = adapter(MockTransport::new().fail("/rpc/Wifi.GetStatus", 503));
        let err = adapter.fetch_wifi_status(&target()).await.unwrap_err();
        assert!(err.is_transport());
    }
}
