//! # pipecheck-registry
//!
//! Read-only data access for pipeline verification.
//!
//! This crate provides:
//! - `Catalog` and typed `Column`s (the measured source tables)
//! - collection records, chain metadata and chain flattening
//! - dataset references, data ids and `key=value` selectors
//! - `FileRepository`, a registry manifest plus JSON dataset files
//!
//! It intentionally does not verify anything. The checks live in
//! `pipecheck-kernel` and only see the `CollectionRegistry` and
//! `CatalogSource` traits.
//!
//! ## Data model
//!
//! ```text
//! registry.json (collections + dataset refs)
//!     │  open
//! FileRepository ── flatten(chain) ──► runs in search order
//!     │  resolve(dataset type, selector)
//! dataset files (catalog JSON / quantity JSON / log records)
//! ```

pub mod catalog;
pub mod collection;
pub mod dataset;
pub mod error;
pub mod io;
pub mod repository;

pub use catalog::{CATALOG_SCHEMA, Catalog, Column, ColumnData, Dtype};
pub use collection::{ChainInfo, CollectionRecord, CollectionType};
pub use dataset::{DataId, DataIdSelector, DataIdValue, DatasetRef, format_data_id};
pub use error::RegistryError;
pub use io::{
    read_catalog_from_path, read_log_records_from_path, read_manifest_from_path,
    read_quantities_from_path,
};
pub use repository::{
    CatalogSource, CollectionRegistry, FileRepository, MANIFEST_FILE_NAME, MANIFEST_SCHEMA,
    RepositoryManifest,
};
