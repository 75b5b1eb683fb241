//! Collection records and chain metadata.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    Run,
    Tagged,
    Calibration,
    Chained,
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Run => "run",
            Self::Tagged => "tagged",
            Self::Calibration => "calibration",
            Self::Chained => "chained",
        };
        f.write_str(label)
    }
}

/// One registered collection. Only chains carry children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub collection_type: CollectionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl CollectionRecord {
    pub fn run(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection_type: CollectionType::Run,
            children: Vec::new(),
        }
    }

    pub fn chain<I, S>(name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            collection_type: CollectionType::Chained,
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_chain(&self) -> bool {
        self.collection_type == CollectionType::Chained
    }
}

/// Declared (unflattened) children of a chained collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub name: String,
    pub children: Vec<String>,
}

impl ChainInfo {
    pub fn contains(&self, collection: &str) -> bool {
        self.children.iter().any(|child| child == collection)
    }
}
