#![deny(warnings)]

#[macro_use]
extern crate serde_derive;

pub use config::{Config, Settings};
pub use directory::Directory;
pub use provider::{Provider, ProviderError, SnapshotProvider};
pub use render::{Record, Renderer};
pub use sync::{sync, write_databases, FileReport, SyncReport};

pub mod config;
pub mod directory;
pub mod provider;
pub mod render;
pub mod sync;
