pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::{ClientConfig, ObjectStoreConfig, SearchConfig, StoreConfig};

#[cfg(feature = "s3")]
pub use adapters::object::s3::S3Backend;
pub use adapters::object::{ObjectBackend, ObjectListing, ObjectStore};
pub use adapters::search::SearchStore;

pub use core::{Context, Keyword, TermValue, Versioned};
pub use domain::model::{BulkReport, ChannelObj, DeleteByQueryReport, ListItem, SelectionPredicate};
pub use domain::ports::Storage;
pub use utils::error::{ErrorKind, HttpError, Result, StorageError};
