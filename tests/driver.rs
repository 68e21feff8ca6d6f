use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use time::macros::datetime;
use timeline_protocol::{
    AgentId, FetchRequest, StreamItem, TimelineTransport, TransportError,
};
use timeline_sync::core::reducer;
use timeline_sync::{
    CoordinatorConfig, DriverStopped, InitError, MemoryStore, SyncDriver, SyncHandle,
};
use timeline_transport_mock::MockTimelineServer;

fn agent() -> AgentId {
    AgentId::new("agent-1")
}

fn message(index: u64) -> StreamItem {
    StreamItem::assistant_message(
        format!("msg-{index}"),
        datetime!(2026-02-14 00:00:00 UTC),
        format!("reply {index}"),
    )
}

/// Accepts requests and never answers them.
#[derive(Default)]
struct SilentTransport {
    requests: Mutex<Vec<FetchRequest>>,
}

impl SilentTransport {
    fn request_count(&self) -> usize {
        self.requests.lock().expect("lock silent transport").len()
    }
}

impl TimelineTransport for SilentTransport {
    fn send_fetch(&self, request: FetchRequest) -> Result<(), TransportError> {
        self.requests
            .lock()
            .expect("lock silent transport")
            .push(request);
        Ok(())
    }
}

fn connected(server: &Arc<MockTimelineServer>) -> (SyncHandle, MemoryStore) {
    let store = MemoryStore::new();
    let (driver, handle) =
        SyncDriver::new(CoordinatorConfig::default(), store.clone(), Arc::clone(server));
    let delivery = handle.clone();
    server.connect(move |message| {
        let _ = delivery.deliver(message);
    });
    driver.spawn();
    (handle, store)
}

/// Waits until everything queued so far, including responses produced while
/// handling it, has been processed.
async fn settle(handle: &SyncHandle) {
    for _ in 0..4 {
        handle.counters().await.expect("driver running");
    }
}

async fn wait_for_requests(transport: &SilentTransport, count: usize) {
    while transport.request_count() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn initial_sync_resolves_over_the_mock_transport() {
    let server = Arc::new(MockTimelineServer::new());
    for index in 1..=3 {
        server.append(&agent(), message(index));
    }
    let (handle, store) = connected(&server);

    handle
        .wait_for_initial_sync(agent())
        .await
        .expect("initial sync");

    let snapshot = store.snapshot(&agent()).expect("agent");
    assert_eq!(snapshot.tail, reducer::hydrate(&server.log(&agent())));
    assert!(!snapshot.initializing);
}

#[tokio::test]
async fn concurrent_waiters_share_one_fetch() {
    let server = Arc::new(MockTimelineServer::new());
    server.append(&agent(), message(1));
    let (handle, _store) = connected(&server);

    let (first, second) = tokio::join!(
        handle.wait_for_initial_sync(agent()),
        handle.wait_for_initial_sync(agent())
    );
    assert_eq!(first, Ok(()));
    assert_eq!(second, Ok(()));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn transport_reported_error_rejects_the_waiter() {
    let server = Arc::new(MockTimelineServer::new());
    server.fail_next_fetch("history unavailable");
    let (handle, store) = connected(&server);

    let error = handle.wait_for_initial_sync(agent()).await.unwrap_err();
    assert_matches!(
        error,
        InitError::Rejected { agent_id, message }
            if agent_id == agent() && message == "history unavailable"
    );
    assert!(!store.snapshot(&agent()).expect("agent").initializing);
    assert_eq!(handle.counters().await.expect("counters").fetch_errors, 1);
}

#[tokio::test]
async fn refused_send_rejects_the_waiter() {
    let server = Arc::new(MockTimelineServer::new());
    server.close();
    let (handle, _store) = connected(&server);

    let error = handle.wait_for_initial_sync(agent()).await.unwrap_err();
    assert_eq!(
        error,
        InitError::Rejected {
            agent_id: agent(),
            message: TransportError::Closed.to_string(),
        }
    );
}

#[tokio::test]
async fn live_events_converge_after_gaps() {
    let server = Arc::new(MockTimelineServer::new());
    server.append(&agent(), message(1));
    let (handle, store) = connected(&server);
    handle
        .wait_for_initial_sync(agent())
        .await
        .expect("initial sync");

    // Seq 2 and 3 never reach the client; 4 exposes the gap.
    server.append(&agent(), message(2));
    server.append(&agent(), message(3));
    server.publish(&agent(), message(4));
    server.publish(&agent(), message(5));
    settle(&handle).await;

    let snapshot = store.snapshot(&agent()).expect("agent");
    assert_eq!(snapshot.tail, reducer::hydrate(&server.log(&agent())));
    assert_eq!(snapshot.cursor.map(|cursor| cursor.end_seq), Some(5));
    let counters = handle.counters().await.expect("counters");
    assert_eq!(counters.catch_ups_scheduled, 1);
}

#[tokio::test]
async fn optimistic_user_message_lands_in_head() {
    let server = Arc::new(MockTimelineServer::new());
    let (handle, store) = connected(&server);
    handle
        .wait_for_initial_sync(agent())
        .await
        .expect("initial sync");

    let id = handle
        .record_user_message(agent(), "hello", datetime!(2026-02-14 00:01:00 UTC))
        .await
        .expect("driver running");
    let snapshot = store.snapshot(&agent()).expect("agent");
    assert_eq!(snapshot.head.len(), 1);
    assert_eq!(snapshot.head[0].id, id);
    assert_eq!(snapshot.head[0].text(), Some("hello"));
}

#[tokio::test]
async fn deleting_the_agent_cancels_a_pending_wait() {
    let transport = Arc::new(SilentTransport::default());
    let (driver, handle) = SyncDriver::new(
        CoordinatorConfig::default(),
        MemoryStore::new(),
        Arc::clone(&transport),
    );
    driver.spawn();

    let waiter = handle.clone();
    let wait = tokio::spawn(async move { waiter.wait_for_initial_sync(agent()).await });
    wait_for_requests(&transport, 1).await;

    handle.delete_agent(agent()).expect("driver running");
    let result = wait.await.expect("wait task");
    assert_eq!(result, Err(InitError::Cancelled { agent_id: agent() }));
}

#[tokio::test]
async fn shutdown_fails_pending_waiters() {
    let transport = Arc::new(SilentTransport::default());
    let (driver, handle) = SyncDriver::new(
        CoordinatorConfig::default(),
        MemoryStore::new(),
        Arc::clone(&transport),
    );
    let task = driver.spawn();

    let waiter = handle.clone();
    let wait = tokio::spawn(async move { waiter.wait_for_initial_sync(agent()).await });
    wait_for_requests(&transport, 1).await;

    handle.shutdown().expect("driver running");
    task.await.expect("driver task");
    assert_eq!(wait.await.expect("wait task"), Err(InitError::DriverStopped));
    assert_eq!(handle.load_older(agent()), Err(DriverStopped));
}

#[tokio::test]
async fn driver_runs_over_a_shared_dyn_transport() {
    let server = Arc::new(MockTimelineServer::new());
    server.append(&agent(), message(1));
    let transport: Arc<dyn TimelineTransport> = server.clone();
    let store = MemoryStore::new();
    let (driver, handle) = SyncDriver::new(CoordinatorConfig::default(), store.clone(), transport);
    let delivery = handle.clone();
    server.connect(move |message| {
        let _ = delivery.deliver(message);
    });
    driver.spawn();

    handle
        .wait_for_initial_sync(agent())
        .await
        .expect("initial sync");
    let snapshot = store.snapshot(&agent()).expect("agent");
    assert_eq!(snapshot.tail, reducer::hydrate(&server.log(&agent())));
}
