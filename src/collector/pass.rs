//! One collection pass for one target.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, StatusCache};
use crate::collector::traits::HealthReporter;
use crate::device::{
    AdapterError, AdapterSet, Component, ComponentKind, DeviceConfig, Phase, ProtocolAdapter,
    Target, discover_components,
};
use crate::metrics::{LabelSet, MetricSurface, bool_to_f64};

/// Default freshness window of cached configuration documents (60 seconds).
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(60);

/// `id` label of the energy-meter aggregate group.
const EM_TOTAL_ID: &str = "em:total";

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassReport {
    /// The configuration document was retrieved.
    pub reachable: bool,
    /// Components enumerated from the configuration.
    pub discovered: usize,
    /// Components whose samples were emitted.
    pub collected: usize,
    /// Components skipped because their status could not be fetched.
    pub failed: usize,
}

/// Drives adapters, discovery and the metric surface for each target.
pub struct MetricCollector {
    adapters: AdapterSet,
    cache: Arc<StatusCache<DeviceConfig>>,
    health: Arc<dyn HealthReporter>,
    config_ttl: Duration,
}

impl MetricCollector {
    /// Create a collector with the default configuration TTL.
    pub fn new(
        adapters: AdapterSet,
        cache: Arc<StatusCache<DeviceConfig>>,
        health: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            adapters,
            cache,
            health,
            config_ttl: DEFAULT_CONFIG_TTL,
        }
    }

    /// Set how long configuration documents are reused. Zero disables caching.
    pub fn with_config_ttl(mut self, ttl: Duration) -> Self {
        self.config_ttl = ttl;
        self
    }

    /// Run one pass for `target`, writing samples to `surface`.
    ///
    /// Only a configuration fetch failure ends the pass early; it is reported
    /// to the health tracker. Every other failure drops the affected metric
    /// family or component and the pass continues.
    pub async fn collect(&self, target: &Target, surface: &MetricSurface) -> PassReport {
        let adapter = self.adapters.for_generation(target.generation);
        let base = LabelSet::for_target(&target.address);
        let mut report = PassReport::default();

        surface.set(
            &surface.info,
            &base.with("generation", target.generation.to_string()),
            1.0,
        );

        let config = match self.device_config(adapter, target).await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(target = %target.address, generation = %target.generation, error = %e, "Failed to fetch device config");
                self.health.mark_unhealthy(&target.address);
                return report;
            }
        };
        report.reachable = true;

        match adapter.fetch_system_status(target).await {
            Ok(status) => {
                if let Some(unixtime) = status.unixtime {
                    surface.set(&surface.sys_unixtime, &base, unixtime as f64);
                }
                surface.set(&surface.sys_uptime, &base, status.uptime as f64);
                surface.set(&surface.sys_mem_total, &base, status.ram_total as f64);
                surface.set(&surface.sys_mem_free, &base, status.ram_free as f64);
                surface.set(&surface.sys_fs_size, &base, status.fs_size as f64);
                surface.set(&surface.sys_fs_free, &base, status.fs_free as f64);
                if let Some(restart_required) = status.restart_required {
                    surface.set(
                        &surface.sys_restart_required,
                        &base,
                        bool_to_f64(restart_required),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(target = %target.address, error = %e, "Failed to fetch system status");
            }
        }

        match adapter.fetch_wifi_status(target).await {
            Ok(status) => match status.rssi {
                Some(rssi) => {
                    let labels = base.with("ssid", status.ssid.unwrap_or_default());
                    surface.set(&surface.wifi_rssi, &labels, rssi);
                }
                None => tracing::debug!(target = %target.address, "Wifi not connected, no rssi"),
            },
            Err(e) => {
                tracing::warn!(target = %target.address, error = %e, "Failed to fetch wifi status");
            }
        }

        let components = discover_components(&config);
        report.discovered = components.len();
        if config.is_empty() {
            tracing::debug!(target = %target.address, "Device config has no entries");
        } else {
            tracing::trace!(target = %target.address, entries = config.len(), components = components.len(), "Discovered components");
        }
        let mut stale_config = false;

        for component in &components {
            let result = match component.kind {
                ComponentKind::Switch => {
                    collect_switch(adapter, target, &base, component, surface).await
                }
                ComponentKind::EnergyMeter => {
                    collect_energy_meter(adapter, target, &base, component, surface).await
                }
                ComponentKind::Temperature => {
                    collect_temperature(adapter, target, &base, component, surface).await
                }
            };

            match result {
                Ok(()) => {
                    report.collected += 1;
                    tracing::debug!(target = %target.address, component = %component.label_id(), "Collected component status");
                }
                Err(e) if e.is_transport() => {
                    report.failed += 1;
                    stale_config |= e.is_missing_component();
                    tracing::warn!(target = %target.address, component = %component.label_id(), error = %e, "Failed to fetch component status");
                }
                Err(e) => {
                    report.failed += 1;
                    stale_config |= e.is_missing_component();
                    tracing::error!(target = %target.address, component = %component.label_id(), error = %e, "Unexpected component status document");
                }
            }
        }
        adapter.finish_pass(target);

        // A component listed in the cached config is gone from the device.
        if stale_config {
            tracing::debug!(target = %target.address, "Dropping cached device config");
            self.cache.invalidate(&CacheKey::config(&target.address));
        }

        report
    }

    async fn device_config(
        &self,
        adapter: &dyn ProtocolAdapter,
        target: &Target,
    ) -> Result<DeviceConfig, AdapterError> {
        let key = CacheKey::config(&target.address);
        if let Some(config) = self.cache.get(&key) {
            tracing::trace!(target = %target.address, "Using cached device config");
            return Ok(config);
        }

        let config = adapter.fetch_config(target).await?;
        self.cache.set(key, config.clone(), self.config_ttl);
        Ok(config)
    }
}

impl std::fmt::Debug for MetricCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricCollector")
            .field("config_ttl", &self.config_ttl)
            .finish_non_exhaustive()
    }
}

fn component_labels(base: &LabelSet, id: impl Into<String>, component: &Component) -> LabelSet {
    base.with("id", id).with("name", component.item.name.as_str())
}

async fn collect_switch(
    adapter: &dyn ProtocolAdapter,
    target: &Target,
    base: &LabelSet,
    component: &Component,
    surface: &MetricSurface,
) -> Result<(), AdapterError> {
    let status = adapter.fetch_switch_status(target, component.item.id).await?;
    let labels = component_labels(base, component.label_id(), component);

    surface.set(
        &surface.switch_on,
        &labels.with("source", status.source),
        bool_to_f64(status.output),
    );
    if let Some(current) = status.current {
        surface.set(&surface.power_current, &labels, current);
    }
    if let Some(active_power) = status.active_power {
        surface.set(&surface.power_total, &labels, active_power);
    }
    Ok(())
}

async fn collect_energy_meter(
    adapter: &dyn ProtocolAdapter,
    target: &Target,
    base: &LabelSet,
    component: &Component,
    surface: &MetricSurface,
) -> Result<(), AdapterError> {
    let status = adapter
        .fetch_energy_meter_status(target, component.item.id)
        .await?;

    for phase in Phase::ALL {
        let reading = status.phase(phase);
        let labels = component_labels(
            base,
            format!("{}:{}", component.label_id(), phase.as_str()),
            component,
        );
        surface.set(&surface.power_current, &labels, reading.current);
        surface.set(&surface.power_apparent_current, &labels, reading.apparent_power);
        surface.set(&surface.power_total, &labels, reading.active_power);
        surface.set(&surface.power_factor, &labels, reading.power_factor);
        surface.set(&surface.power_frequency, &labels, reading.frequency);
        surface.set(&surface.power_voltage, &labels, reading.voltage);
    }

    let labels = component_labels(base, EM_TOTAL_ID, component);
    surface.set(&surface.power_current, &labels, status.total.current);
    surface.set(&surface.power_total, &labels, status.total.active_power);
    Ok(())
}

async fn collect_temperature(
    adapter: &dyn ProtocolAdapter,
    target: &Target,
    base: &LabelSet,
    component: &Component,
    surface: &MetricSurface,
) -> Result<(), AdapterError> {
    let status = adapter
        .fetch_temperature_status(target, component.item.id)
        .await?;

    match status.celsius {
        Some(celsius) => {
            let labels = component_labels(base, component.label_id(), component);
            surface.set(&surface.temperature, &labels, celsius);
        }
        None => {
            tracing::debug!(target = %target.address, component = %component.label_id(), "Sensor reports no temperature");
        }
    }
    Ok(())
}
