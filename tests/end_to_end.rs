use argus::audit::AuditLog;
use argus::config::Config;
use argus::control::ControlPlane;
use argus::engine::FilterEngine;
use argus::flow::{Flow, Request, Response, Verdict};
use argus::init::{bootstrap_files, build_engine};
use std::fs;
use std::path::Path;
use tokio::sync::broadcast::error::TryRecvError;

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.rules_path = dir.join("config").join("blocked_domains.txt");
    config.state_path = dir.join("config").join("state.json");
    config.block_page_path = dir.join("templates").join("blocked_page.html");
    config.audit.sqlite_path = dir.join("argus.db");
    config
}

fn setup(dir: &Path, rules: &str) -> FilterEngine {
    let config = config_in(dir);
    bootstrap_files(&config).unwrap();
    fs::write(&config.rules_path, rules).unwrap();
    fs::create_dir_all(config.block_page_path.parent().unwrap()).unwrap();
    fs::write(
        &config.block_page_path,
        "<html><body><h1>Blocked</h1><p>{{ REASON }}</p><code>{{ BLOCKED_URL }}</code></body></html>",
    )
    .unwrap();
    build_engine(&config).unwrap()
}

fn flow(url: &str) -> Flow {
    Flow::new(
        "10.1.2.3".parse().unwrap(),
        Request::from_url("GET", url).unwrap(),
    )
}

#[test]
fn blocked_host_gets_block_page_and_audit_record() {
    let dir = tempfile::tempdir().unwrap();
    let engine = setup(dir.path(), "# list\nexample.com\n");

    let mut f = flow("https://www.example.com/login?next=/");
    let verdict = engine.on_request(&mut f);
    assert!(verdict.is_blocked());

    let response = f.response.clone().expect("block page attached");
    assert_eq!(response.status, 403);
    assert!(response.content_type.as_deref().unwrap().starts_with("text/html"));
    let body = String::from_utf8(response.body).unwrap();
    assert!(body.contains("https://www.example.com/login?next=/"));
    assert!(body.contains("matched rule: 'example.com'"));

    engine.on_response(&mut f);

    let page = engine.audit().page(1, 50).unwrap();
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.records.len(), 1);
    let record = &page.records[0];
    assert!(record.is_blocked);
    assert_eq!(record.status_code, 403);
    assert_eq!(record.client_ip, "10.1.2.3");
    assert_eq!(record.method, "GET");
    assert_eq!(record.url, "https://www.example.com/login?next=/");
}

#[test]
fn disabled_filtering_passes_through_with_upstream_status() {
    let dir = tempfile::tempdir().unwrap();
    let engine = setup(dir.path(), "example.com\n");
    engine.state().set(false).unwrap();

    let mut f = flow("https://www.example.com/");
    assert_eq!(engine.on_request(&mut f), Verdict::Allowed);
    assert!(f.response.is_none());

    // Upstream answers.
    f.response = Some(Response::new(200, Some("text/html"), "<html></html>"));
    engine.on_response(&mut f);

    let record = &engine.audit().page(1, 50).unwrap().records[0];
    assert!(!record.is_blocked);
    assert_eq!(record.status_code, 200);
}

#[test]
fn toggling_publishes_exactly_two_events() {
    let dir = tempfile::tempdir().unwrap();
    let engine = setup(dir.path(), "");
    let mut rx = engine.subscribe();

    engine.state().set(false).unwrap();
    for _ in 0..5 {
        assert!(!engine.state().state().enabled);
    }
    engine.state().set(true).unwrap();
    for _ in 0..5 {
        assert!(engine.state().state().enabled);
    }

    assert!(!rx.try_recv().unwrap().is_enabled);
    assert!(rx.try_recv().unwrap().is_enabled);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn control_plane_edits_take_effect_on_next_request() {
    let dir = tempfile::tempdir().unwrap();
    let engine = setup(dir.path(), "");
    let control = ControlPlane::for_engine(&engine);

    let mut before = flow("http://ads.tracker.test/pixel.gif");
    assert_eq!(engine.on_request(&mut before), Verdict::Allowed);

    control.add_domain("Tracker.Test").unwrap();
    let mut after = flow("http://ads.tracker.test/pixel.gif");
    assert!(engine.on_request(&mut after).is_blocked());

    control.set_filtering(false).unwrap();
    let mut paused = flow("http://ads.tracker.test/pixel.gif");
    assert_eq!(engine.on_request(&mut paused), Verdict::Allowed);
}

#[test]
fn pages_cover_every_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = setup(dir.path(), "blocked.test\n");

    for n in 0..23 {
        let host = if n % 5 == 0 { "blocked.test" } else { "ok.test" };
        let mut f = flow(&format!("http://{host}/{n}"));
        engine.on_request(&mut f);
        if f.response.is_none() {
            f.response = Some(Response::new(204, None, Vec::new()));
        }
        engine.on_response(&mut f);
    }

    let audit = engine.audit();
    let page_size = 5;
    let first = audit.page(1, page_size).unwrap();
    assert_eq!(first.total_pages, 5);

    let mut ids = Vec::new();
    for p in 1..=first.total_pages as u32 {
        ids.extend(audit.page(p, page_size).unwrap().records.iter().map(|r| r.id));
    }
    let mut expected: Vec<i64> = (1..=23).collect();
    expected.reverse();
    assert_eq!(ids, expected);

    assert!(audit.page(6, page_size).unwrap().records.is_empty());

    let blocked = audit
        .page(1, 100)
        .unwrap()
        .records
        .iter()
        .filter(|r| r.is_blocked)
        .count();
    assert_eq!(blocked, 5);
    assert_eq!(engine.stats().snapshot().blocked, 5);
    assert_eq!(engine.stats().snapshot().exchanges, 23);
}
