//! Session manager tests.
//!
//! These tests drive the manager through in-memory transports to check registration,
//! broadcast fan-out, partial failure isolation and the per-participant read loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use rga_collab::session::{ChannelTransport, CloseReason, Inbound, Outbound, Transport};
use rga_collab::{
    Disposition, ManagerConfig, MemorySnapshotStore, ReplicatedSequence, SessionManager,
    SessionState, SnapshotStore, StoreError, TransportError,
};

fn manager_with(values: &[&str]) -> (Arc<SessionManager>, Arc<MemorySnapshotStore>) {
    let store = Arc::new(MemorySnapshotStore::new());
    let manager = SessionManager::new(
        ReplicatedSequence::from_values(values.iter().copied()),
        store.clone(),
        ManagerConfig::default(),
    );
    (Arc::new(manager), store)
}

fn frame(values: &[&str]) -> Outbound {
    Outbound::Frame(serde_json::to_string(values).unwrap())
}

fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut received = Vec::new();
    while let Ok(message) = rx.try_recv() {
        received.push(message);
    }
    received
}

/// Transport that accepts the first `ok_sends` writes and fails every later one.
struct FlakyTransport {
    ok_sends: usize,
    sends: AtomicUsize,
    closes: AtomicUsize,
}

impl FlakyTransport {
    fn new(ok_sends: usize) -> Self {
        Self {
            ok_sends,
            sends: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn send(&self, _frame: String) -> Result<(), TransportError> {
        if self.sends.fetch_add(1, Ordering::SeqCst) < self.ok_sends {
            Ok(())
        } else {
            Err(TransportError::Io("connection reset".to_string()))
        }
    }

    async fn close(&self, reason: CloseReason) {
        assert_eq!(reason.code, 1011);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store whose saves always fail.
struct BrokenStore;

#[async_trait]
impl SnapshotStore for BrokenStore {
    async fn load(&self) -> Result<Option<Vec<String>>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _values: &[String]) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: "document.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[tokio::test]
async fn test_two_sessions_see_each_others_edits() {
    let (manager, _) = manager_with(&["a", "b"]);
    let (t1, mut rx1) = ChannelTransport::pair();
    let (t2, mut rx2) = ChannelTransport::pair();

    manager.register(Arc::new(t1)).await.unwrap();
    manager.register(Arc::new(t2)).await.unwrap();
    assert_eq!(drain(&mut rx1), vec![frame(&["a", "b"])]);
    assert_eq!(drain(&mut rx2), vec![frame(&["a", "b"])]);

    let disposition = manager
        .handle_message(br#"{"type":"insert","timestamp":"t","position":2,"value":"c"}"#)
        .await;

    assert_eq!(disposition, Disposition::Applied);
    assert_eq!(drain(&mut rx1), vec![frame(&["a", "b", "c"])]);
    assert_eq!(drain(&mut rx2), vec![frame(&["a", "b", "c"])]);
}

#[tokio::test]
async fn test_broadcast_writes_once_per_session() {
    let (manager, _) = manager_with(&[]);
    let mut receivers = Vec::new();
    for _ in 0..5 {
        let (transport, mut rx) = ChannelTransport::pair();
        manager.register(Arc::new(transport)).await.unwrap();
        drain(&mut rx);
        receivers.push(rx);
    }

    manager
        .handle_message(br#"{"type":"insert","position":0,"value":"z"}"#)
        .await;

    for rx in &mut receivers {
        assert_eq!(drain(rx), vec![frame(&["z"])]);
    }
}

#[tokio::test]
async fn test_failed_write_drops_only_that_session() {
    let (manager, _) = manager_with(&["a"]);
    let (t1, mut rx1) = ChannelTransport::pair();
    let (t3, mut rx3) = ChannelTransport::pair();
    let flaky = Arc::new(FlakyTransport::new(1));

    let first = manager.register(Arc::new(t1)).await.unwrap();
    let broken = manager.register(flaky.clone()).await.unwrap();
    let third = manager.register(Arc::new(t3)).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx3);

    manager
        .handle_message(br#"{"type":"delete","position":0}"#)
        .await;

    assert_eq!(drain(&mut rx1), vec![frame(&[])]);
    assert_eq!(drain(&mut rx3), vec![frame(&[])]);
    assert_eq!(manager.session_ids(), vec![first, third]);
    assert_eq!(manager.state(broken), SessionState::Closed);
    assert_eq!(flaky.closes.load(Ordering::SeqCst), 1);

    // Later broadcasts no longer touch the dropped session.
    let mut report = manager.broadcast().await;
    report.delivered.sort();
    assert_eq!(report.delivered, vec![first, third]);
    assert!(report.dropped.is_empty());
    assert_eq!(flaky.sends.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_broadcast_report_lists_dropped_sessions() {
    let (manager, _) = manager_with(&[]);
    let (good, _rx) = ChannelTransport::pair();
    let good = manager.register(Arc::new(good)).await.unwrap();
    let bad = manager
        .register(Arc::new(FlakyTransport::new(1)))
        .await
        .unwrap();

    let report = manager.broadcast().await;

    assert_eq!(report.delivered, vec![good]);
    assert_eq!(report.dropped, vec![bad]);
    assert_eq!(manager.session_count(), 1);
}

#[tokio::test]
async fn test_malformed_message_is_dropped_quietly() {
    let (manager, store) = manager_with(&["a"]);
    let (transport, mut rx) = ChannelTransport::pair();
    manager.register(Arc::new(transport)).await.unwrap();
    drain(&mut rx);

    assert_eq!(manager.handle_message(b"{oops").await, Disposition::Rejected);
    assert_eq!(
        manager
            .handle_message(br#"{"type":"insert","position":"0","value":"x"}"#)
            .await,
        Disposition::Rejected
    );

    assert!(drain(&mut rx).is_empty());
    assert_eq!(manager.document(), vec!["a"]);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_missing_and_null_fields_use_zero_values() {
    let (manager, _) = manager_with(&["a", "b"]);

    assert_eq!(
        manager.handle_message(br#"{"type":"delete"}"#).await,
        Disposition::Applied
    );
    assert_eq!(manager.document(), vec!["b"]);

    assert_eq!(
        manager
            .handle_message(br#"{"type":"insert","position":0,"value":null}"#)
            .await,
        Disposition::Applied
    );
    assert_eq!(manager.document(), vec!["", "b"]);

    assert_eq!(
        manager.handle_message(br#"{"position":0}"#).await,
        Disposition::Ignored
    );
    assert_eq!(manager.document(), vec!["", "b"]);
}

#[tokio::test]
async fn test_out_of_range_insert_is_rejected() {
    let (manager, store) = manager_with(&["a", "b"]);
    let (transport, mut rx) = ChannelTransport::pair();
    manager.register(Arc::new(transport)).await.unwrap();
    drain(&mut rx);

    let disposition = manager
        .handle_message(br#"{"type":"insert","position":5,"value":"x"}"#)
        .await;

    assert_eq!(disposition, Disposition::Rejected);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(manager.document(), vec!["a", "b"]);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_out_of_range_delete_still_broadcasts() {
    let (manager, store) = manager_with(&["a"]);
    let (transport, mut rx) = ChannelTransport::pair();
    manager.register(Arc::new(transport)).await.unwrap();
    drain(&mut rx);

    let disposition = manager
        .handle_message(br#"{"type":"delete","position":9}"#)
        .await;

    assert_eq!(disposition, Disposition::Applied);
    assert_eq!(drain(&mut rx), vec![frame(&["a"])]);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_save_failure_does_not_block_broadcast() {
    let manager = SessionManager::new(
        ReplicatedSequence::new(),
        Arc::new(BrokenStore),
        ManagerConfig::default(),
    );
    let (transport, mut rx) = ChannelTransport::pair();
    manager.register(Arc::new(transport)).await.unwrap();
    drain(&mut rx);

    let disposition = manager
        .handle_message(br#"{"type":"insert","position":0,"value":"k"}"#)
        .await;

    assert_eq!(disposition, Disposition::Applied);
    assert_eq!(manager.document(), vec!["k"]);
    assert_eq!(drain(&mut rx), vec![frame(&["k"])]);
}

#[tokio::test]
async fn test_serve_runs_until_close() {
    let (manager, store) = manager_with(&[]);
    let (watcher, mut watcher_rx) = ChannelTransport::pair();
    manager.register(Arc::new(watcher)).await.unwrap();
    drain(&mut watcher_rx);

    let (transport, mut rx) = ChannelTransport::pair();
    let inbound = stream::iter(vec![
        Ok(Inbound::Text(
            r#"{"type":"insert","position":0,"value":"H"}"#.to_string(),
        )),
        Ok(Inbound::Text("garbage".to_string())),
        Ok(Inbound::Binary(
            br#"{"type":"insert","position":1,"value":"i"}"#.to_vec(),
        )),
        Ok(Inbound::Close),
        Ok(Inbound::Text(
            r#"{"type":"delete","position":0}"#.to_string(),
        )),
    ]);

    manager.serve(Arc::new(transport), inbound).await;

    assert_eq!(
        drain(&mut rx),
        vec![
            frame(&[]),
            frame(&["H"]),
            frame(&["H", "i"]),
            Outbound::Closed(CloseReason::normal()),
        ]
    );
    assert_eq!(drain(&mut watcher_rx), vec![frame(&["H"]), frame(&["H", "i"])]);
    assert_eq!(manager.session_count(), 1);
    assert_eq!(store.snapshot(), Some(vec!["H".to_string(), "i".to_string()]));
}

#[tokio::test]
async fn test_serve_stops_on_read_error() {
    let (manager, _) = manager_with(&["a"]);
    let (transport, mut rx) = ChannelTransport::pair();
    let inbound = stream::iter(vec![
        Err(TransportError::Io("connection reset".to_string())),
        Ok(Inbound::Text(
            r#"{"type":"delete","position":0}"#.to_string(),
        )),
    ]);

    manager.serve(Arc::new(transport), inbound).await;

    assert_eq!(manager.document(), vec!["a"]);
    assert_eq!(manager.session_count(), 0);
    assert_eq!(
        drain(&mut rx),
        vec![frame(&["a"]), Outbound::Closed(CloseReason::normal())]
    );
}

#[tokio::test]
async fn test_concurrent_sessions_converge() {
    let (manager, _) = manager_with(&[]);
    let mut receivers = Vec::new();
    let mut workers = Vec::new();

    for session in 0..4 {
        let (transport, rx) = ChannelTransport::pair();
        receivers.push(rx);

        let messages: Vec<Result<Inbound, TransportError>> = (0..25)
            .map(|i| {
                Ok(Inbound::Text(format!(
                    r#"{{"type":"insert","position":0,"value":"{}{}"}}"#,
                    session, i
                )))
            })
            .collect();

        let manager = Arc::clone(&manager);
        workers.push(tokio::spawn(async move {
            manager
                .serve(Arc::new(transport), stream::iter(messages))
                .await;
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let document = manager.document();
    assert_eq!(document.len(), 100);

    // The last broadcast always reaches the participant that sent the last edit.
    let final_frame = frame(&document.iter().map(String::as_str).collect::<Vec<_>>());
    let mut saw_final = false;
    for rx in &mut receivers {
        let frames: Vec<Outbound> = drain(rx)
            .into_iter()
            .filter(|m| matches!(m, Outbound::Frame(_)))
            .collect();
        assert!(!frames.is_empty());
        saw_final |= frames.last() == Some(&final_frame);
    }
    assert!(saw_final);
}

#[tokio::test]
async fn test_dropped_session_stops_applying_its_messages() {
    let (manager, store) = manager_with(&[]);
    let flaky = Arc::new(FlakyTransport::new(1));
    let (tx, rx) = mpsc::unbounded_channel::<Result<Inbound, TransportError>>();
    let inbound = Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|next| (next, rx))
    }));

    let worker = {
        let manager = Arc::clone(&manager);
        let transport = flaky.clone();
        tokio::spawn(async move { manager.serve(transport, inbound).await })
    };

    for _ in 0..200 {
        if manager.session_count() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(manager.session_count(), 1);

    // The second write fails, which closes the session.
    let report = manager.broadcast().await;
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(manager.session_count(), 0);

    tx.send(Ok(Inbound::Text(
        r#"{"type":"insert","position":0,"value":"late"}"#.to_string(),
    )))
    .unwrap();
    worker.await.unwrap();

    assert!(manager.document().is_empty());
    assert_eq!(store.save_count(), 0);
    assert_eq!(flaky.closes.load(Ordering::SeqCst), 1);
}
