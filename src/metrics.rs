//! Metric surface shared by both device generations.
//!
//! Every scrape registers a fresh [`MetricSurface`] on a fresh
//! [`prometheus::Registry`], so a series that was not written during the pass
//! is simply absent from the exposition.

use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Metric name prefix.
pub const NAMESPACE: &str = "shellyplug";

const TARGET_LABELS: &[&str] = &["target"];
const INFO_LABELS: &[&str] = &["target", "generation"];
const WIFI_LABELS: &[&str] = &["target", "ssid"];
const SWITCH_LABELS: &[&str] = &["target", "id", "name", "source"];
const COMPONENT_LABELS: &[&str] = &["target", "id", "name"];

/// Ordered label set.
///
/// Extending returns a copy, so sibling metric families derived from the same
/// component never share label values by accident.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<(&'static str, String)>,
}

impl LabelSet {
    /// Target identity labels.
    pub fn for_target(address: &str) -> Self {
        Self::default().with("target", address)
    }

    /// Copy of this set with `name` set to `value`.
    #[must_use]
    pub fn with(&self, name: &'static str, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let value = value.into();
        match next.labels.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => next.labels.push((name, value)),
        }
        next
    }

    /// Value of label `name`.
    #[cfg(test)]
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.labels.iter().map(|(n, v)| (*n, v.as_str()))
    }

    fn as_map(&self) -> HashMap<&str, &str> {
        self.iter().collect()
    }
}

/// Labeled gauges written by the collector.
#[derive(Clone)]
pub struct MetricSurface {
    pub info: GaugeVec,
    pub sys_unixtime: GaugeVec,
    pub sys_uptime: GaugeVec,
    pub sys_mem_total: GaugeVec,
    pub sys_mem_free: GaugeVec,
    pub sys_fs_size: GaugeVec,
    pub sys_fs_free: GaugeVec,
    pub sys_restart_required: GaugeVec,
    pub wifi_rssi: GaugeVec,
    pub switch_on: GaugeVec,
    pub power_current: GaugeVec,
    pub power_apparent_current: GaugeVec,
    pub power_total: GaugeVec,
    pub power_factor: GaugeVec,
    pub power_frequency: GaugeVec,
    pub power_voltage: GaugeVec,
    pub temperature: GaugeVec,
}

fn gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let vec = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl MetricSurface {
    /// Create and register all metric families on `registry`.
    ///
    /// # Errors
    /// Returns `prometheus::Error` if a family is already registered.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            info: gauge(registry, "info", "Device presence (always 1)", INFO_LABELS)?,
            sys_unixtime: gauge(registry, "sys_unixtime", "Device clock (unix timestamp)", TARGET_LABELS)?,
            sys_uptime: gauge(registry, "sys_uptime", "Device uptime in seconds", TARGET_LABELS)?,
            sys_mem_total: gauge(registry, "sys_mem_total", "Total RAM in bytes", TARGET_LABELS)?,
            sys_mem_free: gauge(registry, "sys_mem_free", "Free RAM in bytes", TARGET_LABELS)?,
            sys_fs_size: gauge(registry, "sys_fs_size", "Filesystem size in bytes", TARGET_LABELS)?,
            sys_fs_free: gauge(registry, "sys_fs_free", "Free filesystem space in bytes", TARGET_LABELS)?,
            sys_restart_required: gauge(
                registry,
                "sys_restart_required",
                "Restart required to apply configuration (1 = yes)",
                TARGET_LABELS,
            )?,
            wifi_rssi: gauge(registry, "wifi_rssi", "Wifi signal strength in dBm", WIFI_LABELS)?,
            switch_on: gauge(registry, "switch_on", "Switch output state (1 = on)", SWITCH_LABELS)?,
            power_current: gauge(registry, "power_current", "Current in A", COMPONENT_LABELS)?,
            power_apparent_current: gauge(
                registry,
                "power_apparent_current",
                "Apparent power in VA",
                COMPONENT_LABELS,
            )?,
            power_total: gauge(registry, "power_total", "Active power in W", COMPONENT_LABELS)?,
            power_factor: gauge(registry, "power_factor", "Power factor", COMPONENT_LABELS)?,
            power_frequency: gauge(registry, "power_frequency", "Frequency in Hz", COMPONENT_LABELS)?,
            power_voltage: gauge(registry, "power_voltage", "Voltage in V", COMPONENT_LABELS)?,
            temperature: gauge(registry, "temperature", "Temperature in degrees Celsius", COMPONENT_LABELS)?,
        })
    }

    /// Set `gauge{labels}` to `value`.
    ///
    /// A label set that does not match the family's label names is logged and dropped.
    pub fn set(&self, gauge: &GaugeVec, labels: &LabelSet, value: f64) {
        match gauge.get_metric_with(&labels.as_map()) {
            Ok(g) => g.set(value),
            Err(e) => tracing::error!(labels = ?labels, error = %e, "Label set does not match metric family"),
        }
    }
}

impl std::fmt::Debug for MetricSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSurface").finish_non_exhaustive()
    }
}

/// Boolean as gauge value.
pub fn bool_to_f64(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Encode all families of `registry` in text exposition format.
///
/// # Errors
/// Returns `prometheus::Error` if encoding fails.
pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers to read samples back out of a registry.

    use prometheus::Registry;

    /// Value of `name{labels}`; `labels` must match the full label set.
    pub(crate) fn sample(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let family = registry.gather().into_iter().find(|f| f.get_name() == name)?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                let pairs = m.get_label();
                pairs.len() == labels.len()
                    && labels
                        .iter()
                        .all(|(k, v)| pairs.iter().any(|p| p.get_name() == *k && p.get_value() == *v))
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Number of series in family `name`.
    pub(crate) fn series_count(registry: &Registry, name: &str) -> usize {
        registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == name)
            .map(|f| f.get_metric().len())
            .unwrap_or(0)
    }

    /// Total number of series across all families.
    pub(crate) fn total_series(registry: &Registry) -> usize {
        registry
            .gather()
            .iter()
            .map(|f| f.get_metric().len())
            .sum()
    }
}
