//! Device configuration documents and dynamic component discovery.
//!
//! A device describes itself with a configuration document whose keys follow
//! the `<kind>:<index>` convention (`switch:0`, `em:1`, `temperature:100`).
//! Keys are classified by prefix first; only then is the record decoded into
//! [`ComponentItem`]. Unknown prefixes are skipped so that component kinds added
//! by newer firmware never break collection of the known ones.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Self-description of a device, keyed by component key in document order.
///
/// Records stay undecoded until [`discover_components`] has classified them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DeviceConfig {
    entries: IndexMap<String, Box<RawValue>>,
}

impl DeviceConfig {
    /// Decode a configuration document from a JSON object.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Append an entry, serializing `record` as its raw configuration.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        record: &T,
    ) -> Result<(), serde_json::Error> {
        let raw = serde_json::value::to_raw_value(record)?;
        self.entries.insert(key.into(), raw);
        Ok(())
    }

    /// Iterate `(key, raw record)` pairs in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Number of entries, including non-component keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the document has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Component kinds understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Relay output (`switch:<n>`).
    Switch,
    /// Three-phase energy meter (`em:<n>`).
    EnergyMeter,
    /// Temperature sensor (`temperature:<n>`).
    Temperature,
}

impl ComponentKind {
    const ALL: [ComponentKind; 3] = [Self::Switch, Self::EnergyMeter, Self::Temperature];

    /// Configuration key prefix, including the colon.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Switch => "switch:",
            Self::EnergyMeter => "em:",
            Self::Temperature => "temperature:",
        }
    }

    /// Prefix of the `id` metric label.
    pub fn label_prefix(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::EnergyMeter => "em",
            Self::Temperature => "sensor",
        }
    }

    /// Classify a configuration key by prefix.
    ///
    /// Returns `None` for keys of unknown kinds.
    pub fn classify(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| key.starts_with(kind.key_prefix()))
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key_prefix().trim_end_matches(':'))
    }
}

/// Identity of one component, decoded from its configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentItem {
    /// Index used in per-component status requests.
    pub id: u32,
    /// User-assigned label; devices report `null` when unset.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A classified and decoded component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub kind: ComponentKind,
    pub item: ComponentItem,
}

impl Component {
    /// Value of the `id` label, e.g. `switch:0`.
    pub fn label_id(&self) -> String {
        format!("{}:{}", self.kind.label_prefix(), self.item.id)
    }
}

/// Enumerate the known components declared by `config`, in document order.
///
/// A record that fails to decode is logged and skipped; its siblings are
/// still returned.
pub fn discover_components(config: &DeviceConfig) -> Vec<Component> {
    let mut components = Vec::new();

    for (key, raw) in config.entries() {
        let Some(kind) = ComponentKind::classify(key) else {
            continue;
        };

        match serde_json::from_str::<ComponentItem>(raw.get()) {
            Ok(item) => components.push(Component { kind, item }),
            Err(e) => {
                tracing::warn!(key = %key, kind = %kind, error = %e, "Failed to decode component config, skipping");
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> DeviceConfig {
        DeviceConfig::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_classify_known_prefixes() {
        assert_eq!(
            ComponentKind::classify("switch:0"),
            Some(ComponentKind::Switch)
        );
        assert_eq!(
            ComponentKind::classify("em:1"),
            Some(ComponentKind::EnergyMeter)
        );
        assert_eq!(
            ComponentKind::classify("temperature:100"),
            Some(ComponentKind::Temperature)
        );
    }

    #[test]
    fn test_classify_unknown_prefixes() {
        assert_eq!(ComponentKind::classify("sys"), None);
        assert_eq!(ComponentKind::classify("emdata:0"), None);
        assert_eq!(ComponentKind::classify("input:0"), None);
        assert_eq!(ComponentKind::classify("switch"), None);
    }

    #[test]
    fn test_discover_switches_by_key() {
        let cfg = config(
            r#"{
                "ble": {"enable": true},
                "switch:0": {"id": 0, "name": "kettle", "initial_state": "off"},
                "switch:1": {"id": 1, "name": null},
                "sys": {"device": {"name": "kitchen"}}
            }"#,
        );

        let components = discover_components(&cfg);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].kind, ComponentKind::Switch);
        assert_eq!(components[0].item.id, 0);
        assert_eq!(components[0].item.name, "kettle");
        assert_eq!(components[1].item.id, 1);
        assert_eq!(components[1].item.name, "");
    }

    #[test]
    fn test_discover_keeps_document_order() {
        let cfg = config(
            r#"{
                "temperature:100": {"id": 100, "name": "probe"},
                "em:0": {"id": 0, "name": "mains"},
                "switch:0": {"id": 0, "name": "relay"}
            }"#,
        );

        let kinds: Vec<_> = discover_components(&cfg).into_iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ComponentKind::Temperature,
                ComponentKind::EnergyMeter,
                ComponentKind::Switch
            ]
        );
    }

    #[test]
    fn test_discover_skips_undecodable_entry_only() {
        let cfg = config(
            r#"{
                "switch:0": {"name": "no id"},
                "switch:1": "garbage",
                "temperature:2": {"id": 2, "name": "outside"}
            }"#,
        );

        let components = discover_components(&cfg);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].kind, ComponentKind::Temperature);
        assert_eq!(components[0].item.id, 2);
    }

    #[test]
    fn test_discover_empty_config() {
        assert!(discover_components(&DeviceConfig::default()).is_empty());
    }

    #[test]
    fn test_label_id_is_prefixed_by_kind() {
        let item = ComponentItem {
            id: 0,
            name: "x".to_string(),
        };
        let switch = Component {
            kind: ComponentKind::Switch,
            item: item.clone(),
        };
        let em = Component {
            kind: ComponentKind::EnergyMeter,
            item: item.clone(),
        };
        let temp = Component {
            kind: ComponentKind::Temperature,
            item,
        };
        assert_eq!(switch.label_id(), "switch:0");
        assert_eq!(em.label_id(), "em:0");
        assert_eq!(temp.label_id(), "sensor:0");
    }

    #[test]
    fn test_insert_synthesized_entry() {
        let mut cfg = DeviceConfig::default();
        cfg.insert(
            "switch:0",
            &ComponentItem {
                id: 0,
                name: "lamp".to_string(),
            },
        )
        .unwrap();

        assert_eq!(cfg.len(), 1);
        let components = discover_components(&cfg);
        assert_eq!(components[0].item.name, "lamp");
    }
}
