pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{toml_config::TomlConfig, RuntimeConfig};

pub use adapters::inventory_file::InventoryFile;
pub use crate::core::{reply::ReplyChannelManager, InventoryStore, LendingService, ServiceSettings};
pub use utils::error::{LendingError, Result, ServiceError};
