//! Error types for repository access.

/// Errors raised while loading or querying a repository.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The named collection is not registered.
    #[error("collection not found: {0}")]
    MissingCollection(String),

    /// The named collection exists but is not a chained collection.
    #[error("collection `{name}` is a {actual} collection, not a chain")]
    NotAChain { name: String, actual: String },

    /// No dataset of the requested type matched the selector.
    #[error("no `{dataset_type}` dataset matching `{selector}` in collections {collections:?}")]
    DatasetNotFound {
        dataset_type: String,
        selector: String,
        collections: Vec<String>,
    },

    /// More than one dataset in the same run matched the selector.
    #[error("{count} `{dataset_type}` datasets in run `{run}` match `{selector}`; refine the data id")]
    AmbiguousDataset {
        dataset_type: String,
        selector: String,
        run: String,
        count: usize,
    },

    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("{path}: parse error: {message}")]
    Parse { path: String, message: String },

    /// A catalog violates its structural contract (ragged or duplicate columns).
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The repository manifest is inconsistent.
    #[error("invalid repository manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid data id selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
