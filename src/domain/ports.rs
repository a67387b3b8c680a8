use crate::domain::model::{Inventory, Response};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncWrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Dropped,
}

/// Best-effort delivery of a response to its requester.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, response: &Response) -> DeliveryOutcome;
}

/// Opens a named reply channel for writing.
///
/// An `Err` from `open` means the channel is not (yet) there; callers retry.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    type Writer: AsyncWrite + Unpin + Send;

    async fn open(&self, channel: &str) -> std::io::Result<Self::Writer>;
}

/// Where the inventory comes from at startup and goes to at shutdown.
pub trait InventoryRepository: Send + Sync {
    fn load(&self) -> Result<Inventory>;
    fn save(&self, inventory: &Inventory) -> Result<()>;
}
