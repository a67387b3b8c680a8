use crate::core::codec;
use crate::core::inventory::InventoryStore;
use crate::core::stats::ServiceStats;
use crate::domain::model::{Operation, OperationKind, Response};
use crate::domain::ports::ReplySink;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Entry on the internal dispatcher -> worker queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Apply(Operation),
    /// Last item the dispatcher ever sends.
    Terminate,
}

/// Sole writer for returns and renewals.
///
/// Drains the queue in FIFO order, one operation at a time, and stops on
/// [`QueueItem::Terminate`] or when every sender is gone. Everything enqueued
/// before the sentinel is applied.
pub struct ReturnRenewWorker {
    store: Arc<InventoryStore>,
    replies: Arc<dyn ReplySink>,
    stats: Arc<ServiceStats>,
    queue: mpsc::Receiver<QueueItem>,
}

impl ReturnRenewWorker {
    pub fn new(
        store: Arc<InventoryStore>,
        replies: Arc<dyn ReplySink>,
        stats: Arc<ServiceStats>,
        queue: mpsc::Receiver<QueueItem>,
    ) -> Self {
        Self {
            store,
            replies,
            stats,
            queue,
        }
    }

    /// Returns how many operations were applied.
    pub async fn run(mut self) -> usize {
        tracing::debug!("Return/renew worker started");
        let mut applied = 0;

        while let Some(item) = self.queue.recv().await {
            match item {
                QueueItem::Apply(op) => {
                    self.apply(op).await;
                    applied += 1;
                }
                QueueItem::Terminate => break,
            }
        }

        tracing::info!("Return/renew worker stopped after {} operations", applied);
        applied
    }

    async fn apply(&self, op: Operation) {
        let text = match op.kind {
            OperationKind::Return => {
                let outcome = self.store.try_return(op.isbn, &op.title_name);
                self.stats.record_return(outcome.is_ok());
                match outcome {
                    Ok(copy) => tracing::info!("Return applied: ISBN {}, copy {}", op.isbn, copy),
                    Err(e) => tracing::info!("Return refused for ISBN {}: {}", op.isbn, e),
                }
                codec::return_response(op.isbn, outcome)
            }
            OperationKind::Renew => {
                let outcome = self.store.try_renew(op.isbn, &op.title_name);
                self.stats.record_renewal(outcome.is_ok());
                match &outcome {
                    Ok(receipt) => tracing::info!(
                        "Renewal applied: ISBN {}, copy {}, due {}",
                        op.isbn,
                        receipt.copy_number,
                        receipt.due_date
                    ),
                    Err(e) => tracing::info!("Renewal refused for ISBN {}: {}", op.isbn, e),
                }
                codec::renew_response(op.isbn, outcome)
            }
            other => {
                tracing::warn!("Worker ignoring {:?} operation", other);
                return;
            }
        };

        let delivery = self.replies.send(&Response::new(op.requester_id, text)).await;
        self.stats.record_delivery(delivery);
    }
}
