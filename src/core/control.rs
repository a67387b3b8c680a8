use crate::core::inventory::InventoryStore;
use crate::core::shutdown::{ShutdownListener, ShutdownSignal};
use crate::domain::model::SnapshotEntry;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

const USAGE: &str = "Commands: r | report (print inventory), s | shutdown (stop service), h | help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Report,
    Shutdown,
    Help,
    Unknown(String),
}

impl ControlCommand {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim();
        if word.is_empty() {
            return None;
        }
        Some(match word.to_ascii_lowercase().as_str() {
            "r" | "report" => ControlCommand::Report,
            "s" | "shutdown" => ControlCommand::Shutdown,
            "h" | "help" => ControlCommand::Help,
            _ => ControlCommand::Unknown(word.to_string()),
        })
    }
}

pub fn render_report(entries: &[SnapshotEntry]) -> String {
    let mut report = String::from("Report:\n");
    for entry in entries {
        report.push_str(&entry.to_string());
        report.push('\n');
    }
    report
}

/// Operator console: answers report requests and can stop the service.
///
/// Runs until shutdown is requested from anywhere. A closed command source
/// does not stop the service; the worker then just waits for shutdown.
/// Console write failures are logged once and further output is skipped.
pub struct ControlWorker<W> {
    store: Arc<InventoryStore>,
    shutdown: Arc<ShutdownSignal>,
    listener: ShutdownListener,
    commands: mpsc::Receiver<String>,
    out: W,
    out_broken: bool,
}

impl<W: AsyncWrite + Unpin> ControlWorker<W> {
    pub fn new(
        store: Arc<InventoryStore>,
        shutdown: Arc<ShutdownSignal>,
        commands: mpsc::Receiver<String>,
        out: W,
    ) -> Self {
        let listener = shutdown.listener();
        Self {
            store,
            shutdown,
            listener,
            commands,
            out,
            out_broken: false,
        }
    }

    /// Hands the output back once the worker stops.
    pub async fn run(mut self) -> W {
        self.write_line(USAGE).await;

        loop {
            tokio::select! {
                biased;
                _ = self.listener.requested() => break,
                line = self.commands.recv() => match line {
                    Some(line) => {
                        if self.handle(&line).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("Console input closed, waiting for shutdown");
                        self.listener.requested().await;
                        break;
                    }
                },
            }
        }

        tracing::debug!("Control worker stopped");
        self.out
    }

    /// Returns `true` when the command stopped the service.
    async fn handle(&mut self, line: &str) -> bool {
        match ControlCommand::parse(line) {
            None => false,
            Some(ControlCommand::Report) => {
                let report = render_report(&self.store.snapshot());
                self.write(report.as_bytes()).await;
                false
            }
            Some(ControlCommand::Shutdown) => {
                tracing::info!("🛑 Shutdown requested from console");
                self.shutdown.request();
                self.write_line("Shutting down...").await;
                true
            }
            Some(ControlCommand::Help) => {
                self.write_line(USAGE).await;
                false
            }
            Some(ControlCommand::Unknown(word)) => {
                self.write_line(&format!("Unknown command '{}'. {}", word, USAGE))
                    .await;
                false
            }
        }
    }

    async fn write_line(&mut self, line: &str) {
        let mut text = String::with_capacity(line.len() + 1);
        text.push_str(line);
        text.push('\n');
        self.write(text.as_bytes()).await;
    }

    async fn write(&mut self, bytes: &[u8]) {
        if self.out_broken {
            return;
        }
        let written = match self.out.write_all(bytes).await {
            Ok(()) => self.out.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!("Console output failed, further output skipped: {}", e);
            self.out_broken = true;
        }
    }
}
