pub mod codec;
pub mod control;
pub mod dispatcher;
pub mod inventory;
pub mod reply;
pub mod service;
pub mod shutdown;
pub mod stats;
pub mod worker;

pub use crate::domain::model::{Inventory, Operation, OperationKind};
pub use crate::domain::ports::{InventoryRepository, ReplySink, ReplyTransport};
pub use crate::utils::error::Result;
pub use inventory::InventoryStore;
pub use service::{LendingService, ServiceSettings};
