use async_trait::async_trait;
use lending_service::adapters::inventory_file::parse_inventory;
use lending_service::core::dispatcher::DispatchStop;
use lending_service::domain::model::{CopyStatus, DueDate, Response};
use lending_service::domain::ports::{DeliveryOutcome, InventoryRepository, ReplySink};
use lending_service::{InventoryFile, InventoryStore, LendingService, ServiceSettings};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(u32, String)>>,
}

impl RecordingSink {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, response: &Response) -> DeliveryOutcome {
        self.sent
            .lock()
            .unwrap()
            .push((response.requester_id, response.text.clone()));
        DeliveryOutcome::Delivered
    }
}

struct ClosedConsole;

impl AsyncWrite for ClosedConsole {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "stdout closed",
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "stdout closed",
        )))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn store_from(text: &str) -> Arc<InventoryStore> {
    Arc::new(InventoryStore::new(
        parse_inventory(text.as_bytes(), 100, 10).unwrap(),
    ))
}

fn fast_settings() -> ServiceSettings {
    ServiceSettings {
        poll_interval: Duration::from_millis(5),
        ..ServiceSettings::default()
    }
}

#[tokio::test]
async fn test_clean_code_loan_exhaust_return() {
    let store = store_from("Clean Code,111,1\n1,D,01-01-2025\n");
    let sink = Arc::new(RecordingSink::default());
    let service = LendingService::new(store.clone(), sink.clone(), fast_settings());

    let (mut client, server) = tokio::io::duplex(1024);
    let (_commands_tx, commands) = mpsc::channel(4);
    client
        .write_all(
            b"P,Clean Code,111,4242\0P,Clean Code,111,4243\0D,Clean Code,111,4242\0Q,shutdown,0,1\0",
        )
        .await
        .unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run(server, commands, Vec::<u8>::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.stop, DispatchStop::QuitReceived);
    assert_eq!(report.worker_applied, 1);
    assert_eq!(
        sink.texts(),
        vec![
            "Loan successful: ISBN 111, copy 1, due 08-01-2025",
            "Error: no available copy for ISBN 111",
            "Return successful: ISBN 111, copy 1",
        ]
    );

    let snapshot = store.snapshot();
    assert_eq!(snapshot[0].copy.status, CopyStatus::Available);
    assert_eq!(snapshot[0].copy.due_date, DueDate::new(8, 1, 2025));

    assert_eq!(report.stats.loans_granted, 1);
    assert_eq!(report.stats.loans_refused, 1);
    assert_eq!(report.stats.returns_applied, 1);
    assert_eq!(report.stats.replies_delivered, 3);
}

#[tokio::test]
async fn test_unknown_kind_is_discarded_without_reply() {
    let store = store_from("Book,123,1\n1,D,01-01-2025\n");
    let sink = Arc::new(RecordingSink::default());
    let service = LendingService::new(store.clone(), sink.clone(), fast_settings());

    let (mut client, server) = tokio::io::duplex(256);
    let (_commands_tx, commands) = mpsc::channel(4);
    client
        .write_all(b"X,Book,123,55\0Q,shutdown,0,1\0")
        .await
        .unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run(server, commands, Vec::<u8>::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(sink.texts().is_empty());
    assert_eq!(report.stats.decode_failures, 1);
    assert_eq!(store.snapshot()[0].copy.status, CopyStatus::Available);
}

#[tokio::test]
async fn test_quit_drains_queued_returns() {
    let store = store_from(
        "Dune,9,3\n1,P,05-05-2025\n2,P,06-05-2025\n3,P,07-05-2025\n",
    );
    let sink = Arc::new(RecordingSink::default());
    let settings = ServiceSettings {
        queue_capacity: 1,
        ..fast_settings()
    };
    let service = LendingService::new(store.clone(), sink.clone(), settings);

    let (mut client, server) = tokio::io::duplex(1024);
    let (_commands_tx, commands) = mpsc::channel(4);
    client
        .write_all(b"D,Dune,9,1\0D,Dune,9,2\0D,Dune,9,3\0Q,shutdown,0,4\0")
        .await
        .unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run(server, commands, Vec::<u8>::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.worker_applied, 3);
    assert_eq!(sink.texts().len(), 3);
    assert!(store
        .snapshot()
        .iter()
        .all(|entry| entry.copy.status == CopyStatus::Available));
}

#[tokio::test]
async fn test_quit_drains_queued_returns_into_saved_file() {
    let dir = TempDir::new().unwrap();
    let saved = InventoryFile::new(dir.path().join("final.txt"), 100, 10);
    let store = store_from(
        "Dune,9,3\n1,P,05-05-2025\n2,P,06-05-2025\n3,P,07-05-2025\n",
    );
    let settings = ServiceSettings {
        queue_capacity: 1,
        ..fast_settings()
    };
    let service = LendingService::new(store, Arc::new(RecordingSink::default()), settings);

    let (mut client, server) = tokio::io::duplex(1024);
    let (_commands_tx, commands) = mpsc::channel(4);
    client
        .write_all(b"D,Dune,9,1\0D,Dune,9,2\0D,Dune,9,3\0Q,shutdown,0,4\0")
        .await
        .unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run_and_save(server, commands, Vec::<u8>::new(), Some(&saved)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(report.worker_applied, 3);

    let reloaded = saved.load().unwrap();
    assert_eq!(reloaded.titles.len(), 1);
    assert!(reloaded.titles[0]
        .copies
        .iter()
        .all(|copy| copy.status == CopyStatus::Available));
    assert_eq!(
        std::fs::read_to_string(saved.path()).unwrap(),
        "Dune,9,3\n1,D,05-05-2025\n2,D,06-05-2025\n3,D,07-05-2025\n"
    );
}

#[tokio::test]
async fn test_broken_console_does_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let saved = InventoryFile::new(dir.path().join("final.txt"), 100, 10);
    let store = store_from("Dune,9,1\n1,P,05-05-2025\n");
    let service = LendingService::new(store.clone(), Arc::new(RecordingSink::default()), fast_settings());

    let (mut client, server) = tokio::io::duplex(256);
    let (commands_tx, commands) = mpsc::channel(4);
    commands_tx.send("report".to_string()).await.unwrap();
    client.write_all(b"D,Dune,9,1\0Q,x,0,1\0").await.unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run_and_save(server, commands, ClosedConsole, Some(&saved)),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.stop, DispatchStop::QuitReceived);
    assert_eq!(store.snapshot()[0].copy.status, CopyStatus::Available);
    assert_eq!(
        saved.load().unwrap().titles[0].copies[0].status,
        CopyStatus::Available
    );
}

#[tokio::test]
async fn test_console_report_and_shutdown() {
    let store = store_from("Clean Code,111,2\n1,P,08-01-2025\n2,D,03-02-2025\n");
    let sink = Arc::new(RecordingSink::default());
    let service = LendingService::new(store, sink, fast_settings());

    // writer stays open and silent; the console stops the service
    let (_client, server) = tokio::io::duplex(64);
    let (commands_tx, commands) = mpsc::channel(4);
    commands_tx.send("report".to_string()).await.unwrap();
    commands_tx.send("s".to_string()).await.unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run(server, commands, Vec::<u8>::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.stop, DispatchStop::ShutdownRequested);
    let console = String::from_utf8(report.console).unwrap();
    assert!(console.contains(
        "Report:\nP, Clean Code, 111, 1, 08-01-2025\nD, Clean Code, 111, 2, 03-02-2025\n"
    ));
    assert!(console.contains("Shutting down..."));
}

#[tokio::test]
async fn test_external_shutdown_signal_stops_idle_service() {
    let store = store_from("Book,1,1\n1,D,01-01-2025\n");
    let service = LendingService::new(store, Arc::new(RecordingSink::default()), fast_settings());
    let signal = service.shutdown_signal();

    let (_client, server) = tokio::io::duplex(64);
    let (_commands_tx, commands) = mpsc::channel(4);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.request();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        service.run(server, commands, Vec::<u8>::new()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(report.stop, DispatchStop::ShutdownRequested);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loans_never_exceed_copies() {
    let store = store_from("Popular,7,3\n1,D,01-01-2025\n2,D,01-01-2025\n3,D,01-01-2025\n");

    let mut tasks = Vec::new();
    for i in 0..24 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                let _ = store.try_renew(7, "Popular");
                None
            } else {
                store.try_loan(7, "Popular").ok().map(|r| r.copy_number)
            }
        }));
    }

    let mut granted = Vec::new();
    for task in tasks {
        if let Some(copy) = task.await.unwrap() {
            granted.push(copy);
        }
    }

    assert_eq!(granted.len(), 3);
    let distinct: HashSet<u32> = granted.iter().copied().collect();
    assert_eq!(distinct.len(), 3);
    assert!(store
        .snapshot()
        .iter()
        .all(|entry| entry.copy.status == CopyStatus::Loaned));
}
