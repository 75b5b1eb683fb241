//! Dataset references, data ids and selectors.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single data id dimension value (`visit=903342`, `instrument=HSC`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataIdValue {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for DataIdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

pub type DataId = BTreeMap<String, DataIdValue>;

/// Render a data id as `key=value,...` in key order.
pub fn format_data_id(data_id: &DataId) -> String {
    data_id
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// A reference to one stored dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub id: String,
    pub dataset_type: String,
    pub run: String,
    #[serde(default)]
    pub data_id: DataId,
    pub path: String,
}

impl DatasetRef {
    /// Identity of the dataset ignoring its id: (dataset type, data id).
    pub fn unresolved(&self) -> (String, DataId) {
        (self.dataset_type.clone(), self.data_id.clone())
    }
}

/// Partial data id used to pick datasets: `visit=903342,detector=10`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataIdSelector {
    constraints: Vec<(String, String)>,
}

impl DataIdSelector {
    /// Selector with no constraints; matches every dataset.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, RegistryError> {
        let mut constraints = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(RegistryError::InvalidSelector {
                    selector: text.to_string(),
                    reason: format!("`{part}` is not key=value"),
                });
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(RegistryError::InvalidSelector {
                    selector: text.to_string(),
                    reason: format!("`{part}` has an empty key or value"),
                });
            }
            if constraints.iter().any(|(k, _): &(String, String)| k == key) {
                return Err(RegistryError::InvalidSelector {
                    selector: text.to_string(),
                    reason: format!("`{key}` given more than once"),
                });
            }
            constraints.push((key.to_string(), value.to_string()));
        }
        Ok(Self { constraints })
    }

    pub fn matches(&self, data_id: &DataId) -> bool {
        self.constraints.iter().all(|(key, expected)| {
            data_id
                .get(key)
                .is_some_and(|value| value.to_string() == *expected)
        })
    }
}

impl std::fmt::Display for DataIdSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .constraints
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        f.write_str(&rendered.join(","))
    }
}

/// Selector pinning every dimension of a full data id.
impl From<&DataId> for DataIdSelector {
    fn from(data_id: &DataId) -> Self {
        Self {
            constraints: data_id
                .iter()
                .map(|(key, value)| (key.clone(), value.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_id() -> DataId {
        BTreeMap::from([
            ("instrument".to_string(), DataIdValue::Str("HSC".to_string())),
            ("visit".to_string(), DataIdValue::Int(903342)),
            ("detector".to_string(), DataIdValue::Int(10)),
        ])
    }

    #[test]
    fn selector_matches_subset_of_dimensions() {
        let selector = DataIdSelector::parse("visit=903342, detector=10").expect("selector");
        assert!(selector.matches(&data_id()));
        assert_eq!(selector.to_string(), "visit=903342,detector=10");

        let other = DataIdSelector::parse("detector=11").expect("selector");
        assert!(!other.matches(&data_id()));
    }

    #[test]
    fn selector_requires_dimension_presence() {
        let selector = DataIdSelector::parse("band=i").expect("selector");
        assert!(!selector.matches(&data_id()));
        assert!(DataIdSelector::any().matches(&data_id()));
    }

    #[test]
    fn selector_from_data_id_pins_every_dimension() {
        let selector = DataIdSelector::from(&data_id());
        assert!(selector.matches(&data_id()));
        assert_eq!(selector.to_string(), "detector=10,instrument=HSC,visit=903342");

        let mut other = data_id();
        other.insert("visit".to_string(), DataIdValue::Int(903344));
        assert!(!selector.matches(&other));
    }

    #[test]
    fn selector_rejects_malformed_text() {
        assert!(DataIdSelector::parse("visit").is_err());
        assert!(DataIdSelector::parse("visit=").is_err());
        assert!(DataIdSelector::parse("visit=1,visit=2").is_err());
    }

    #[test]
    fn data_id_deserializes_mixed_values() {
        let parsed: DataId =
            serde_json::from_str(r#"{"instrument":"HSC","visit":903342,"detector":10}"#)
                .expect("data id should parse");
        assert_eq!(parsed, data_id());
        assert_eq!(format_data_id(&parsed), "detector=10,instrument=HSC,visit=903342");
    }
}
