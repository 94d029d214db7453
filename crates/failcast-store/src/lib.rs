//! Failcast record store
//!
//! Read-only access to the three inputs of a prediction:
//! job configurations, execution history and cluster capacity.
//!
//! - [`RecordStore`]: the contract the pipeline depends on
//! - [`FileStore`]: loads exported JSON/YAML files
//! - [`InMemoryStore`]: owned vectors, for tests and embedding
//! - [`kubectl`]: derives cluster capacity from `kubectl top nodes` and
//!   execution history from `kubectl get jobs -o json`

#![warn(unreachable_pub)]

pub mod error;
pub mod file;
pub mod kubectl;
pub mod memory;
pub mod store;

pub use error::{RecordKind, StoreError};
pub use file::{ClusterFile, DataPaths, FileStore, HistoryFile};
pub use memory::InMemoryStore;
pub use store::RecordStore;
