//! End-to-end sweeps against local HTTP servers
//!
//! These tests load a sites file, check real sockets and read the persisted
//! state file back.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sitemon::config::Schedule;
use sitemon::sites::load_sites;
use sitemon::{HttpChecker, MonitorState, MonitoringScheduler, StateStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answer every request with `status` until the test ends
async fn serve(status: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response =
                    format!("HTTP/1.1 {status} Status\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok");
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });

    url
}

async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    format!("http://{}/", listener.local_addr().unwrap())
}

fn checker() -> Arc<HttpChecker> {
    Arc::new(HttpChecker::new(Duration::from_secs(5), "SiteMonitor/1.0 (integration)").unwrap())
}

#[tokio::test]
async fn test_sweep_persists_every_configured_site() {
    logger::init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let ok = serve(200).await;
    let failing = serve(500).await;
    let refused = refused_url().await;

    let sites_path = dir.path().join("sites-config.json");
    fs::write(
        &sites_path,
        serde_json::json!([
            {"name": "OK", "url": ok},
            {"name": "Failing", "url": failing},
            {"name": "Refused", "url": refused},
        ])
        .to_string(),
    )
    .unwrap();

    let sites = load_sites(&sites_path);
    let state_path = dir.path().join("data/monitor-state.json");
    let store = StateStore::new(&state_path);
    let schedule = Schedule { pacing_delay_ms: 200, ..Schedule::default() };
    let scheduler = MonitoringScheduler::new(checker(), store.clone(), sites, schedule);

    let started = Instant::now();
    let sweep_start = chrono::Utc::now();
    let state = scheduler.run_sweep(&MonitorState::default()).await;

    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(state.sites.len(), scheduler.sites().len());
    assert!(state.last_check.unwrap() >= sweep_start);

    let ok_result = &state.sites[0];
    assert!(ok_result.success);
    assert_eq!(ok_result.status, Some(200));
    assert!(ok_result.error.is_none());

    let failing_result = &state.sites[1];
    assert!(!failing_result.success);
    assert_eq!(failing_result.status, Some(500));
    assert!(failing_result.error.is_none());

    let refused_result = &state.sites[2];
    assert!(!refused_result.success);
    assert_eq!(refused_result.status, None);
    assert!(!refused_result.error.as_deref().unwrap_or_default().is_empty());

    assert_eq!(store.load(), state);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&state_path).unwrap()).unwrap();
    assert!(json["lastCheck"].is_string());
    assert_eq!(json["sites"].as_array().unwrap().len(), 3);
    assert_eq!(json["sites"][0]["name"], "OK");
    assert_eq!(json["sites"][1]["status"], 500);
    assert!(json["sites"][2]["status"].is_null());
    assert!(json["sites"][2]["responseTime"].is_null());
}

#[tokio::test]
async fn test_missing_sites_file_monitors_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let sites = load_sites(&dir.path().join("nope.json"));
    let store = StateStore::new(dir.path().join("monitor-state.json"));
    let scheduler = MonitoringScheduler::new(checker(), store.clone(), sites, Schedule::default());

    let state = scheduler.run_sweep(&MonitorState::default()).await;

    assert!(state.sites.is_empty());
    assert_eq!(store.load(), state);
}

#[tokio::test]
async fn test_next_sweep_replaces_state() {
    let dir = tempfile::tempdir().unwrap();
    let ok = serve(204).await;

    let store = StateStore::new(dir.path().join("monitor-state.json"));
    let sites = vec![sitemon::SiteConfig::new("OK", ok)];
    let schedule = Schedule { pacing_delay_ms: 0, ..Schedule::default() };
    let scheduler = MonitoringScheduler::new(checker(), store.clone(), sites, schedule);

    let first = scheduler.run_sweep(&store.load()).await;
    let second = scheduler.run_sweep(&first).await;

    assert_eq!(second.sites.len(), 1);
    assert!(second.last_check >= first.last_check);
    assert_eq!(store.load(), second);
}
