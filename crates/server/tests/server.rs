use linestream_server::{
    LineProducer, LineStreamingServer, RunSummary, ServerConfig, ServerError, ServerState,
    SessionOutcome, StopHandle,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start<P>(delay_ms: u64, producer: P) -> (SocketAddr, StopHandle, JoinHandle<RunSummary>)
where
    P: LineProducer + 'static,
{
    let server = LineStreamingServer::bind(ServerConfig::local(0, delay_ms), producer)
        .await
        .unwrap();
    let addr = server.local_addr();
    let handle = server.stop_handle();
    let task = tokio::spawn(server.run());
    (addr, handle, task)
}

async fn connect(addr: SocketAddr) -> Lines<BufReader<TcpStream>> {
    let stream = TcpStream::connect(addr).await.unwrap();
    BufReader::new(stream).lines()
}

async fn next_line(lines: &mut Lines<BufReader<TcpStream>>) -> String {
    timeout(TIMEOUT, lines.next_line())
        .await
        .expect("timed out waiting for a line")
        .unwrap()
        .expect("connection closed")
}

fn sequence(words: &'static [&'static str]) -> impl FnMut() -> String + Send {
    let mut i = 0;
    move || {
        let word = words[i % words.len()];
        i += 1;
        word.to_string()
    }
}

#[tokio::test]
async fn test_streams_lines_in_order() {
    let (addr, handle, task) = start(10, sequence(&["alpha", "beta", "gamma"])).await;
    let mut lines = connect(addr).await;

    assert_eq!(next_line(&mut lines).await, "alpha");
    assert_eq!(next_line(&mut lines).await, "beta");
    assert_eq!(next_line(&mut lines).await, "gamma");
    assert_eq!(next_line(&mut lines).await, "alpha");
    assert_eq!(handle.state(), ServerState::Connected);

    handle.stop();
    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::Stopped);
    assert!(summary.lines_sent >= 4);
    assert_eq!(handle.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_stop_before_connect() {
    let (addr, handle, task) = start(10, || "never".to_string()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), ServerState::Listening);

    handle.stop();
    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert_eq!(
        summary,
        RunSummary {
            lines_sent: 0,
            outcome: SessionOutcome::StoppedBeforeConnect,
        }
    );

    // The listening socket is closed.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_stop_before_run() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let server = LineStreamingServer::bind(ServerConfig::local(0, 10), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        "never".to_string()
    })
    .await
    .unwrap();
    let addr = server.local_addr();
    let handle = server.stop_handle();

    handle.stop();
    assert!(TcpStream::connect(addr).await.is_err());

    let summary = timeout(TIMEOUT, server.run()).await.unwrap();
    assert_eq!(summary.outcome, SessionOutcome::StoppedBeforeConnect);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_while_connected_closes_client() {
    let built = Arc::new(AtomicU64::new(0));
    let counter = built.clone();
    let (addr, handle, task) = start(20, move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        format!("line-{}", n)
    })
    .await;

    let mut lines = connect(addr).await;
    assert_eq!(next_line(&mut lines).await, "line-0");

    handle.stop();
    let built_at_stop = built.load(Ordering::SeqCst);

    let mut received = 1;
    loop {
        match timeout(TIMEOUT, lines.next_line()).await.unwrap() {
            Ok(Some(_)) => received += 1,
            Ok(None) | Err(_) => break,
        }
    }
    assert!(received <= built_at_stop + 1);

    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::Stopped);
    assert_eq!(summary.lines_sent, received);
}

#[tokio::test]
async fn test_client_disconnect_ends_run() {
    let (addr, handle, task) = start(5, || "payload".to_string()).await;

    let mut lines = connect(addr).await;
    assert_eq!(next_line(&mut lines).await, "payload");
    drop(lines);

    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::ClientDisconnected);
    assert!(summary.lines_sent >= 1);
    assert!(handle.is_stopped());
    assert_eq!(handle.state(), ServerState::Stopped);

    // Stopping after the session ended is a no-op.
    handle.stop();
}

#[tokio::test]
async fn test_lines_are_paced_by_delay() {
    let delay = Duration::from_millis(50);
    let built_at = Arc::new(Mutex::new(Vec::new()));
    let record = built_at.clone();
    let (addr, handle, task) = start(50, move || {
        record.lock().push(Instant::now());
        "tick".to_string()
    })
    .await;

    let mut lines = connect(addr).await;
    for _ in 0..4 {
        assert_eq!(next_line(&mut lines).await, "tick");
    }
    handle.stop();
    timeout(TIMEOUT, task).await.unwrap().unwrap();

    let built_at = built_at.lock();
    assert!(built_at.len() >= 4);
    for pair in built_at.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= delay);
    }
}

#[tokio::test]
async fn test_embedded_delimiters_are_replaced() {
    let (addr, handle, task) = start(10, || "a\nb\rc".to_string()).await;

    let mut lines = connect(addr).await;
    assert_eq!(next_line(&mut lines).await, "a b c");
    assert_eq!(next_line(&mut lines).await, "a b c");

    handle.stop();
    timeout(TIMEOUT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_zero_delay() {
    let (addr, handle, task) = start(0, sequence(&["x"])).await;

    let mut lines = connect(addr).await;
    for _ in 0..100 {
        assert_eq!(next_line(&mut lines).await, "x");
    }

    handle.stop();
    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert!(summary.lines_sent >= 100);
}

#[tokio::test]
async fn test_bind_occupied_port_fails() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = LineStreamingServer::bind(ServerConfig::local(port, 10), || "x".to_string()).await;
    match result {
        Err(ServerError::Bind { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", port));
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("bind on an occupied port succeeded"),
    }
}

#[tokio::test]
async fn test_reader_for_a_while_then_disconnect() {
    let (addr, _handle, task) = start(100, sequence(&["alpha", "beta", "gamma", "delta"])).await;

    let mut lines = connect(addr).await;
    let mut received = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(250);
    while let Ok(Ok(Some(line))) = tokio::time::timeout_at(deadline, lines.next_line()).await {
        received.push(line);
    }
    drop(lines);

    assert!(received.len() >= 2 && received.len() <= 3, "{:?}", received);
    assert_eq!(received[0], "alpha");
    assert_eq!(received[1], "beta");

    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::ClientDisconnected);
}

#[tokio::test]
async fn test_stop_unblocks_write_to_stalled_client() {
    let big_line = "x".repeat(1024 * 1024);
    let (addr, handle, task) = start(0, move || big_line.clone()).await;

    // Connected but never reads, so the send buffer fills and the write blocks.
    let _client = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.state(), ServerState::Connected);

    handle.stop();
    let summary = timeout(Duration::from_secs(3), task)
        .await
        .expect("run still blocked in write after stop")
        .unwrap();
    assert_eq!(summary.outcome, SessionOutcome::Stopped);
    assert_eq!(handle.state(), ServerState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stops_during_accept() {
    let (addr, handle, task) = start(10, || "never".to_string()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), ServerState::Listening);

    let stoppers: Vec<_> = (0..8)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.stop() })
        })
        .collect();
    for stopper in stoppers {
        stopper.await.unwrap();
    }

    let summary = timeout(TIMEOUT, task).await.unwrap().unwrap();
    assert_eq!(
        summary,
        RunSummary {
            lines_sent: 0,
            outcome: SessionOutcome::StoppedBeforeConnect,
        }
    );
    assert!(handle.is_stopped());
    assert_eq!(handle.state(), ServerState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
}
