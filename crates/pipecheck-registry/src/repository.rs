//! Read-only repository access.
//!
//! The verification core only sees the two traits below. `FileRepository`
//! is the shipped adapter: a directory holding `registry.json` plus the
//! dataset files it references.

use crate::catalog::Catalog;
use crate::collection::{ChainInfo, CollectionRecord, CollectionType};
use crate::dataset::{DataIdSelector, DatasetRef};
use crate::error::RegistryError;
use crate::io::{
    read_catalog_from_path, read_log_records_from_path, read_manifest_from_path,
    read_quantities_from_path,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "registry.json";
pub const MANIFEST_SCHEMA: u32 = 1;

/// Collection metadata queries.
pub trait CollectionRegistry {
    /// Declared children of a chained collection.
    ///
    /// Absent collections yield [`RegistryError::MissingCollection`].
    fn query_chain_info(&self, name: &str) -> Result<ChainInfo, RegistryError>;

    /// True when `name` is a registered chained collection.
    fn chain_exists(&self, name: &str) -> bool {
        self.query_chain_info(name).is_ok()
    }

    /// Expand nested chains into leaf collections, first occurrence wins.
    fn flatten(&self, name: &str) -> Result<Vec<String>, RegistryError>;

    /// Datasets stored in `run`, optionally restricted to one dataset type.
    fn datasets_in(
        &self,
        run: &str,
        dataset_type: Option<&str>,
    ) -> Result<Vec<DatasetRef>, RegistryError>;

    /// True when the dataset's stored artifact can be found.
    fn dataset_exists(&self, dataset: &DatasetRef) -> bool;
}

/// Dataset content retrieval.
pub trait CatalogSource {
    /// Load the first catalog of `dataset_type` matching `selector`,
    /// searching `collections` in flattened order.
    fn get_catalog(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<Catalog, RegistryError>;

    /// Load a quantity dataset (`name -> number`), resolved the same way.
    fn get_quantities(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<BTreeMap<String, f64>, RegistryError>;

    /// Load the records of a log dataset, resolved the same way.
    fn get_log_records(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<Vec<serde_json::Value>, RegistryError>;
}

/// On-disk registry manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryManifest {
    pub schema: u32,
    #[serde(default)]
    pub collections: Vec<CollectionRecord>,
    #[serde(default)]
    pub datasets: Vec<DatasetRef>,
}

/// Repository backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
    collections: BTreeMap<String, CollectionRecord>,
    datasets: Vec<DatasetRef>,
}

impl FileRepository {
    /// Open a repository from its root directory or its manifest path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let (root, manifest_path) = if path.is_dir() {
            (path.to_path_buf(), path.join(MANIFEST_FILE_NAME))
        } else {
            let root = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, path.to_path_buf())
        };
        let manifest = read_manifest_from_path(&manifest_path)?;
        log::debug!(
            "loaded manifest {} ({} collections, {} datasets)",
            manifest_path.display(),
            manifest.collections.len(),
            manifest.datasets.len()
        );
        Self::from_manifest(root, manifest)
    }

    /// Build a repository from an already-parsed manifest.
    ///
    /// Duplicate collection names resolve last-write-wins. Chains may only
    /// name registered collections and datasets must live in runs.
    pub fn from_manifest(
        root: impl Into<PathBuf>,
        manifest: RepositoryManifest,
    ) -> Result<Self, RegistryError> {
        if manifest.schema != MANIFEST_SCHEMA {
            return Err(RegistryError::InvalidManifest(format!(
                "unsupported schema {} (expected {MANIFEST_SCHEMA})",
                manifest.schema
            )));
        }

        let mut collections = BTreeMap::new();
        for record in manifest.collections {
            if !record.is_chain() && !record.children.is_empty() {
                return Err(RegistryError::InvalidManifest(format!(
                    "{} collection `{}` declares children",
                    record.collection_type, record.name
                )));
            }
            if let Some(previous) = collections.insert(record.name.clone(), record) {
                log::warn!("collection `{}` registered twice; keeping the last", previous.name);
            }
        }

        for record in collections.values() {
            for child in &record.children {
                if !collections.contains_key(child) {
                    return Err(RegistryError::InvalidManifest(format!(
                        "chain `{}` names unknown child `{child}`",
                        record.name
                    )));
                }
            }
        }

        for dataset in &manifest.datasets {
            match collections.get(&dataset.run) {
                Some(record) if record.collection_type == CollectionType::Run => {}
                Some(record) => {
                    return Err(RegistryError::InvalidManifest(format!(
                        "dataset `{}` is stored in {} collection `{}`",
                        dataset.id, record.collection_type, record.name
                    )));
                }
                None => {
                    return Err(RegistryError::InvalidManifest(format!(
                        "dataset `{}` is stored in unknown run `{}`",
                        dataset.id, dataset.run
                    )));
                }
            }
        }

        Ok(Self {
            root: root.into(),
            collections,
            datasets: manifest.datasets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionRecord> {
        self.collections.get(name)
    }

    /// All registered collection names in sorted order.
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    fn flatten_into(
        &self,
        name: &str,
        visiting: &mut BTreeSet<String>,
        seen: &mut BTreeSet<String>,
        out: &mut Vec<String>,
    ) -> Result<(), RegistryError> {
        let record = self
            .collections
            .get(name)
            .ok_or_else(|| RegistryError::MissingCollection(name.to_string()))?;
        if !record.is_chain() {
            if seen.insert(name.to_string()) {
                out.push(name.to_string());
            }
            return Ok(());
        }
        // A chain reachable from itself contributes nothing new.
        if !visiting.insert(name.to_string()) {
            return Ok(());
        }
        for child in &record.children {
            self.flatten_into(child, visiting, seen, out)?;
        }
        visiting.remove(name);
        Ok(())
    }

    fn resolve_dataset(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<&DatasetRef, RegistryError> {
        let mut searched = BTreeSet::new();
        for collection in collections {
            for run in self.flatten(collection)? {
                if !searched.insert(run.clone()) {
                    continue;
                }
                let found: Vec<&DatasetRef> = self
                    .datasets
                    .iter()
                    .filter(|d| {
                        d.run == run
                            && d.dataset_type == dataset_type
                            && selector.matches(&d.data_id)
                    })
                    .collect();
                match found.as_slice() {
                    [] => continue,
                    [single] => {
                        log::debug!(
                            "resolved `{dataset_type}` {selector} to {} in {run}",
                            single.id
                        );
                        return Ok(single);
                    }
                    many => {
                        return Err(RegistryError::AmbiguousDataset {
                            dataset_type: dataset_type.to_string(),
                            selector: selector.to_string(),
                            run,
                            count: many.len(),
                        });
                    }
                }
            }
        }
        Err(RegistryError::DatasetNotFound {
            dataset_type: dataset_type.to_string(),
            selector: selector.to_string(),
            collections: collections.to_vec(),
        })
    }
}

impl CollectionRegistry for FileRepository {
    fn query_chain_info(&self, name: &str) -> Result<ChainInfo, RegistryError> {
        let record = self
            .collections
            .get(name)
            .ok_or_else(|| RegistryError::MissingCollection(name.to_string()))?;
        if !record.is_chain() {
            return Err(RegistryError::NotAChain {
                name: name.to_string(),
                actual: record.collection_type.to_string(),
            });
        }
        Ok(ChainInfo {
            name: record.name.clone(),
            children: record.children.clone(),
        })
    }

    fn flatten(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        let mut out = Vec::new();
        self.flatten_into(name, &mut BTreeSet::new(), &mut BTreeSet::new(), &mut out)?;
        Ok(out)
    }

    fn datasets_in(
        &self,
        run: &str,
        dataset_type: Option<&str>,
    ) -> Result<Vec<DatasetRef>, RegistryError> {
        if !self.collections.contains_key(run) {
            return Err(RegistryError::MissingCollection(run.to_string()));
        }
        Ok(self
            .datasets
            .iter()
            .filter(|d| d.run == run && dataset_type.is_none_or(|t| d.dataset_type == t))
            .cloned()
            .collect())
    }

    fn dataset_exists(&self, dataset: &DatasetRef) -> bool {
        self.root.join(&dataset.path).is_file()
    }
}

impl CatalogSource for FileRepository {
    fn get_catalog(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<Catalog, RegistryError> {
        let dataset = self.resolve_dataset(dataset_type, selector, collections)?;
        read_catalog_from_path(self.root.join(&dataset.path))
    }

    fn get_quantities(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<BTreeMap<String, f64>, RegistryError> {
        let dataset = self.resolve_dataset(dataset_type, selector, collections)?;
        read_quantities_from_path(self.root.join(&dataset.path))
    }

    fn get_log_records(
        &self,
        dataset_type: &str,
        selector: &DataIdSelector,
        collections: &[String],
    ) -> Result<Vec<serde_json::Value>, RegistryError> {
        let dataset = self.resolve_dataset(dataset_type, selector, collections)?;
        read_log_records_from_path(self.root.join(&dataset.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataIdValue;

    fn dataset(id: &str, dataset_type: &str, run: &str, visit: i64) -> DatasetRef {
        DatasetRef {
            id: id.to_string(),
            dataset_type: dataset_type.to_string(),
            run: run.to_string(),
            data_id: BTreeMap::from([
                ("instrument".to_string(), DataIdValue::Str("HSC".to_string())),
                ("visit".to_string(), DataIdValue::Int(visit)),
            ]),
            path: format!("{run}/{id}.json"),
        }
    }

    fn repo() -> FileRepository {
        let manifest = RepositoryManifest {
            schema: MANIFEST_SCHEMA,
            collections: vec![
                CollectionRecord::run("HSC/raw/all"),
                CollectionRecord::run("HSC/calib"),
                CollectionRecord::run("refcats"),
                CollectionRecord::run("demo/run1"),
                CollectionRecord::run("demo/run0"),
                CollectionRecord::chain("HSC/defaults", ["HSC/raw/all", "HSC/calib", "refcats"]),
                CollectionRecord::chain(
                    "demo",
                    ["demo/run1", "demo/run0", "HSC/defaults", "refcats"],
                ),
            ],
            datasets: vec![
                dataset("a", "src", "demo/run1", 1),
                dataset("b", "src", "demo/run0", 1),
                dataset("c", "src", "demo/run0", 2),
            ],
        };
        FileRepository::from_manifest("/nonexistent", manifest).expect("repository should build")
    }

    #[test]
    fn flatten_expands_nested_chains_and_dedupes() {
        let flattened = repo().flatten("demo").expect("flatten should succeed");
        assert_eq!(
            flattened,
            vec!["demo/run1", "demo/run0", "HSC/raw/all", "HSC/calib", "refcats"]
        );
    }

    #[test]
    fn flatten_of_run_is_itself() {
        assert_eq!(repo().flatten("refcats").expect("flatten"), vec!["refcats"]);
    }

    #[test]
    fn chain_info_reports_declared_children() {
        let repo = repo();
        let info = repo.query_chain_info("demo").expect("chain should exist");
        assert!(info.contains("HSC/defaults"));
        assert!(repo.chain_exists("demo"));
        assert!(!repo.chain_exists("missing"));
        assert!(!repo.chain_exists("refcats"));
        assert!(matches!(
            repo.query_chain_info("missing"),
            Err(RegistryError::MissingCollection(_))
        ));
        assert!(matches!(
            repo.query_chain_info("refcats"),
            Err(RegistryError::NotAChain { .. })
        ));
    }

    #[test]
    fn resolve_prefers_first_run_in_chain_order() {
        let repo = repo();
        let selector = DataIdSelector::parse("visit=1").expect("selector");
        let found = repo
            .resolve_dataset("src", &selector, &["demo".to_string()])
            .expect("dataset should resolve");
        assert_eq!(found.id, "a");

        let selector = DataIdSelector::parse("visit=2").expect("selector");
        let found = repo
            .resolve_dataset("src", &selector, &["demo".to_string()])
            .expect("dataset should resolve");
        assert_eq!(found.id, "c");
    }

    #[test]
    fn resolve_reports_ambiguous_and_missing() {
        let repo = repo();
        let any = DataIdSelector::any();
        assert!(matches!(
            repo.resolve_dataset("src", &any, &["demo/run0".to_string()]),
            Err(RegistryError::AmbiguousDataset { count: 2, .. })
        ));
        assert!(matches!(
            repo.resolve_dataset("calexp", &any, &["demo".to_string()]),
            Err(RegistryError::DatasetNotFound { .. })
        ));
    }

    #[test]
    fn datasets_in_filters_by_type() {
        let repo = repo();
        assert_eq!(repo.datasets_in("demo/run0", None).expect("run").len(), 2);
        assert_eq!(repo.datasets_in("demo/run0", Some("calexp")).expect("run").len(), 0);
        assert!(repo.datasets_in("nope", None).is_err());
    }

    #[test]
    fn manifest_rejects_unknown_chain_child() {
        let manifest = RepositoryManifest {
            schema: MANIFEST_SCHEMA,
            collections: vec![CollectionRecord::chain("demo", ["ghost"])],
            datasets: Vec::new(),
        };
        assert!(matches!(
            FileRepository::from_manifest(".", manifest),
            Err(RegistryError::InvalidManifest(_))
        ));
    }

    #[test]
    fn manifest_rejects_dataset_outside_run() {
        let manifest = RepositoryManifest {
            schema: MANIFEST_SCHEMA,
            collections: vec![
                CollectionRecord::run("r"),
                CollectionRecord::chain("demo", ["r"]),
            ],
            datasets: vec![dataset("a", "src", "demo", 1)],
        };
        assert!(matches!(
            FileRepository::from_manifest(".", manifest),
            Err(RegistryError::InvalidManifest(_))
        ));
    }
}
