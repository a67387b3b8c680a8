use crate::core::codec::{self, FrameReader};
use crate::core::inventory::InventoryStore;
use crate::core::shutdown::{ShutdownListener, ShutdownSignal};
use crate::core::stats::ServiceStats;
use crate::core::worker::QueueItem;
use crate::domain::model::{Operation, OperationKind, Response};
use crate::domain::ports::ReplySink;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// Why the dispatcher stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStop {
    QuitReceived,
    ShutdownRequested,
    QueueClosed,
}

/// Reads inbound records, serves loans inline and forwards returns and
/// renewals to the worker queue.
///
/// Whatever ends the loop, [`QueueItem::Terminate`] is enqueued last so the
/// worker drains everything accepted before it.
pub struct Dispatcher<R> {
    frames: FrameReader<R>,
    store: Arc<InventoryStore>,
    replies: Arc<dyn ReplySink>,
    stats: Arc<ServiceStats>,
    queue: mpsc::Sender<QueueItem>,
    shutdown: Arc<ShutdownSignal>,
    listener: ShutdownListener,
    poll_interval: Duration,
    max_name_len: usize,
}

impl<R: AsyncRead + Unpin> Dispatcher<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frames: FrameReader<R>,
        store: Arc<InventoryStore>,
        replies: Arc<dyn ReplySink>,
        stats: Arc<ServiceStats>,
        queue: mpsc::Sender<QueueItem>,
        shutdown: Arc<ShutdownSignal>,
        poll_interval: Duration,
        max_name_len: usize,
    ) -> Self {
        let listener = shutdown.listener();
        Self {
            frames,
            store,
            replies,
            stats,
            queue,
            shutdown,
            listener,
            poll_interval,
            max_name_len,
        }
    }

    pub async fn run(mut self) -> DispatchStop {
        tracing::debug!("Dispatcher started");

        let stop = loop {
            tokio::select! {
                biased;
                _ = self.listener.requested() => break DispatchStop::ShutdownRequested,
                frame = self.frames.next_frame() => match frame {
                    Ok(Some(Ok(record))) => {
                        if let ControlFlow::Break(stop) = self.handle_record(&record).await {
                            break stop;
                        }
                    }
                    Ok(Some(Err(e))) => {
                        self.stats.record_decode_failure();
                        tracing::warn!("Discarding inbound frame: {}", e);
                    }
                    Ok(None) => tokio::time::sleep(self.poll_interval).await,
                    Err(e) => {
                        tracing::warn!("Inbound read failed: {}", e);
                        tokio::time::sleep(self.poll_interval).await;
                    }
                },
            }
        };

        if stop == DispatchStop::QueueClosed {
            self.shutdown.request();
        }
        if self.queue.send(QueueItem::Terminate).await.is_err() {
            tracing::debug!("Worker queue already closed");
        }

        tracing::info!("Dispatcher stopped: {:?}", stop);
        stop
    }

    async fn handle_record(&mut self, record: &str) -> ControlFlow<DispatchStop> {
        let op = match codec::decode_request(record, self.max_name_len) {
            Ok(op) => op,
            Err(e) => {
                self.stats.record_decode_failure();
                tracing::warn!("Discarding record {:?}: {}", record, e);
                return ControlFlow::Continue(());
            }
        };

        tracing::debug!(
            "Received {:?} for {:?} (ISBN {}) from requester {}",
            op.kind,
            op.title_name,
            op.isbn,
            op.requester_id
        );

        match op.kind {
            OperationKind::Quit => {
                tracing::info!("🛑 Quit received from requester {}", op.requester_id);
                self.shutdown.request();
                ControlFlow::Break(DispatchStop::QuitReceived)
            }
            OperationKind::Loan => {
                self.lend(op).await;
                ControlFlow::Continue(())
            }
            OperationKind::Return | OperationKind::Renew => {
                match self.queue.send(QueueItem::Apply(op)).await {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => {
                        tracing::error!("Worker queue closed, stopping dispatcher");
                        ControlFlow::Break(DispatchStop::QueueClosed)
                    }
                }
            }
        }
    }

    /// The reply is awaited inline, so a shutdown requested meanwhile is seen
    /// once delivery finishes or gives up (at most attempts × retry delay).
    async fn lend(&mut self, op: Operation) {
        let outcome = self.store.try_loan(op.isbn, &op.title_name);
        self.stats.record_loan(outcome.is_ok());
        match &outcome {
            Ok(receipt) => tracing::info!(
                "Loan granted: ISBN {}, copy {}, due {}",
                op.isbn,
                receipt.copy_number,
                receipt.due_date
            ),
            Err(e) => tracing::info!("Loan refused for ISBN {}: {}", op.isbn, e),
        }
        let text = codec::loan_response(op.isbn, outcome);
        let delivery = self.replies.send(&Response::new(op.requester_id, text)).await;
        self.stats.record_delivery(delivery);
    }
}
