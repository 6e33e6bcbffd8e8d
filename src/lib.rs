//! roku-sync: Roku discovery merged into a Homebridge config.
//!
//! Discovers a Roku device on the local network, shapes its metadata and
//! installed channels into an `accessories` fragment, and deep-merges that
//! fragment into an existing Homebridge `config.json`. Array elements are
//! reconciled by their `name` field, so a rediscovered device updates its
//! existing entry in place and everything else in the file survives.

pub mod discovery;
pub mod error;
pub mod logging;
pub mod merge;

pub use discovery::build_descriptor_fragment;
pub use error::{ConfigError, DiscoveryError, PersistenceError};
pub use merge::{merge_documents, merge_into_persisted_config};
