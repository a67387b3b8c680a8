use crate::core::codec::{FrameReader, DEFAULT_MAX_FRAME_LEN, DEFAULT_MAX_NAME_LEN};
use crate::core::control::ControlWorker;
use crate::core::dispatcher::{DispatchStop, Dispatcher};
use crate::core::inventory::InventoryStore;
use crate::core::reply::ReplySettings;
use crate::core::shutdown::ShutdownSignal;
use crate::core::stats::{ServiceStats, StatsSummary};
use crate::core::worker::ReturnRenewWorker;
use crate::domain::ports::{InventoryRepository, ReplySink};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_TITLES: usize = 100;
pub const DEFAULT_MAX_COPIES: usize = 10;

/// Runtime knobs for one service instance.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub max_frame_len: usize,
    pub max_name_len: usize,
    pub max_titles: usize,
    pub max_copies: usize,
    pub reply: ReplySettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_titles: DEFAULT_MAX_TITLES,
            max_copies: DEFAULT_MAX_COPIES,
            reply: ReplySettings::default(),
        }
    }
}

/// What a finished run looked like.
#[derive(Debug)]
pub struct ServiceReport<W> {
    pub stop: DispatchStop,
    pub worker_applied: usize,
    pub stats: StatsSummary,
    pub console: W,
}

/// Wires the store to the dispatcher, the return/renew worker and the
/// control worker, then waits for all three to finish.
pub struct LendingService {
    store: Arc<InventoryStore>,
    replies: Arc<dyn ReplySink>,
    shutdown: Arc<ShutdownSignal>,
    stats: Arc<ServiceStats>,
    settings: ServiceSettings,
}

impl LendingService {
    pub fn new(
        store: Arc<InventoryStore>,
        replies: Arc<dyn ReplySink>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            replies,
            shutdown: Arc::new(ShutdownSignal::new()),
            stats: Arc::new(ServiceStats::new()),
            settings,
        }
    }

    pub fn store(&self) -> Arc<InventoryStore> {
        Arc::clone(&self.store)
    }

    /// Handle for stopping the service from outside, e.g. on Ctrl-C.
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    pub fn stats(&self) -> Arc<ServiceStats> {
        Arc::clone(&self.stats)
    }

    pub async fn run<R, W>(
        &self,
        inbound: R,
        commands: mpsc::Receiver<String>,
        console: W,
    ) -> Result<ServiceReport<W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!(
            "🚀 Lending service started with {} titles and {} copies",
            self.store.title_count(),
            self.store.copy_count()
        );

        let (queue_tx, queue_rx) = mpsc::channel(self.settings.queue_capacity.max(1));

        let worker = ReturnRenewWorker::new(
            self.store(),
            Arc::clone(&self.replies),
            self.stats(),
            queue_rx,
        );
        let dispatcher = Dispatcher::new(
            FrameReader::new(inbound, self.settings.max_frame_len),
            self.store(),
            Arc::clone(&self.replies),
            self.stats(),
            queue_tx,
            self.shutdown_signal(),
            self.settings.poll_interval,
            self.settings.max_name_len,
        );
        let control = ControlWorker::new(self.store(), self.shutdown_signal(), commands, console);

        let worker_task = tokio::spawn(worker.run());
        let dispatcher_task = tokio::spawn(dispatcher.run());
        let control_task = tokio::spawn(control.run());

        let stop = dispatcher_task.await;
        // the control worker only exits once shutdown is requested
        self.shutdown.request();
        let worker_applied = worker_task.await;
        let console = control_task.await;

        self.shutdown.mark_stopped();
        let stop = stop?;
        let worker_applied = worker_applied?;
        let console = console?;

        tracing::info!("✅ Lending service stopped ({:?})", stop);
        self.stats.log_final_stats();

        Ok(ServiceReport {
            stop,
            worker_applied,
            stats: self.stats.summary(),
            console,
        })
    }

    /// [`run`](Self::run), then persist the final inventory to `repository`.
    ///
    /// The inventory is saved even when the run itself failed; the run error
    /// takes precedence over a save error.
    pub async fn run_and_save<R, W>(
        &self,
        inbound: R,
        commands: mpsc::Receiver<String>,
        console: W,
        repository: Option<&dyn InventoryRepository>,
    ) -> Result<ServiceReport<W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let outcome = self.run(inbound, commands, console).await;

        let Some(repository) = repository else {
            return outcome;
        };
        let saved = repository.save(&self.store.inventory());

        match (outcome, saved) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), saved) => {
                if let Err(save_error) = saved {
                    tracing::error!("Inventory save failed after a failed run: {}", save_error);
                }
                Err(e)
            }
        }
    }
}
