//! End-to-end tests of the HTTP surface against the mock serial provider.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use sl_domain::config::{Config, SerialProviderKind};
use sl_gateway::state::AppState;
use sl_gateway::{api, bootstrap};
use sl_serial::MockSerialProvider;

struct TestApp {
    _dir: tempfile::TempDir,
    app: Router,
    mock: MockSerialProvider,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("public");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<h1>SerialLog</h1>").unwrap();

        let mut config = Config::default();
        config.logs.dir = dir.path().join("logs");
        config.logs.default_name = Some("default".into());
        config.server.static_dir = static_dir;
        config.serial.provider = SerialProviderKind::Mock;

        let mock = MockSerialProvider::new(["COM1", "COM2"]);
        let state =
            bootstrap::build_app_state_with(Arc::new(config), Arc::new(mock.clone())).unwrap();
        let app = api::router(&state.config).with_state(state.clone());

        Self {
            _dir: dir,
            app,
            mock,
            state,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, String) {
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = self.send(req).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn post_raw(&self, uri: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_owned()))
            .unwrap();
        let (status, body) = self.send(req).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn content(&self, filename: &str) -> String {
        let (status, v) = self.get_json(&format!("/api/data?filename={filename}")).await;
        assert_eq!(status, StatusCode::OK);
        v["content"].as_str().unwrap().to_owned()
    }
}

// ── Ports & status ───────────────────────────────────────────────────

#[tokio::test]
async fn lists_mock_ports() {
    let t = TestApp::new();
    let (status, v) = t.get_json("/api/ports").await;
    assert_eq!(status, StatusCode::OK);
    let paths: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["COM1", "COM2"]);
}

#[tokio::test]
async fn idle_status_reports_default_log() {
    let t = TestApp::new();
    let (status, v) = t.get_json("/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["activePorts"], json!([]));
    assert_eq!(v["connected"], false);
    assert_eq!(v["filename"], "default.txt");
}

// ── Connect / disconnect ─────────────────────────────────────────────

#[tokio::test]
async fn connect_inject_disconnect_reconnect() {
    let t = TestApp::new();

    let (status, v) = t
        .post(
            "/api/connect",
            json!({ "path": "COM1", "baudRate": "9600", "logName": "sessionA" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["port"], "COM1");
    assert_eq!(v["filename"], "sessionA.txt");
    assert_eq!(v["baudRate"], 9600);

    let (status, _) = t
        .post("/api/mock", json!({ "data": "hello", "logName": "sessionA" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let session_a = t.content("sessionA").await;
    assert!(session_a.lines().any(|l| l.ends_with("hello")));

    let (_, v) = t.get_json("/api/status").await;
    assert_eq!(v["activePorts"], json!(["COM1"]));
    assert_eq!(v["sessions"][0]["filename"], "sessionA.txt");
    assert_eq!(v["filename"], "sessionA.txt");

    let (status, _) = t.post("/api/disconnect", json!({ "path": "COM1" })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, v) = t.get_json("/api/status").await;
    assert_eq!(v["activePorts"], json!([]));

    let (status, _) = t
        .post(
            "/api/connect",
            json!({ "path": "COM1", "baudRate": 9600, "logName": "sessionB" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    t.post("/api/mock", json!({ "data": "world", "logName": "sessionB" }))
        .await;

    assert_eq!(t.content("sessionA").await, session_a);
    assert!(t.content("sessionB").await.contains("world"));
}

#[tokio::test]
async fn connect_validates_fields() {
    let t = TestApp::new();

    let (status, v) = t.post("/api/connect", json!({ "logName": "a" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "missing field: path");

    let (status, v) = t.post("/api/connect", json!({ "path": "COM1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "missing field: logName");

    let (status, _) = t
        .post("/api/connect", json!({ "path": "COM1", "logName": "../x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!t.mock.is_open("COM1"));
}

#[tokio::test]
async fn connect_accepts_legacy_filename_key() {
    let t = TestApp::new();
    let (status, v) = t
        .post("/api/connect", json!({ "path": "COM1", "filename": "legacy" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["filename"], "legacy.txt");
    assert_eq!(t.mock.last_baud_rate("COM1"), Some(9600));
}

#[tokio::test]
async fn unparseable_baud_rate_uses_default() {
    let t = TestApp::new();
    for (path, baud) in [("COM1", json!(9600.5)), ("COM2", json!(-1))] {
        let (status, v) = t
            .post(
                "/api/connect",
                json!({ "path": path, "logName": "b", "baudRate": baud }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{baud}");
        assert_eq!(v["baudRate"], 9600);
        assert_eq!(t.mock.last_baud_rate(path), Some(9600));
    }
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let t = TestApp::new();
    let (status, v) = t
        .post_raw("/api/connect", "application/json", "{\"path\": ")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().is_some());

    let (status, v) = t.post_raw("/api/mock", "text/plain", "data=x").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(v["error"].as_str().is_some());
    assert!(!t.mock.is_open("COM1"));
}

#[tokio::test]
async fn form_encoded_bodies_are_accepted() {
    let t = TestApp::new();
    let (status, v) = t
        .post_raw(
            "/api/connect",
            "application/x-www-form-urlencoded",
            "path=COM1&baudRate=19200&logName=form",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["filename"], "form.txt");
    assert_eq!(t.mock.last_baud_rate("COM1"), Some(19200));

    let (status, _) = t
        .post_raw(
            "/api/mock",
            "application/x-www-form-urlencoded",
            "data=hello+there&logName=form",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(t.content("form").await.ends_with("] hello there\n"));
}

#[tokio::test]
async fn second_connect_conflicts() {
    let t = TestApp::new();
    t.post("/api/connect", json!({ "path": "COM1", "logName": "a" }))
        .await;
    let (status, v) = t
        .post("/api/connect", json!({ "path": "COM1", "logName": "b" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(v["error"].as_str().unwrap().contains("already open"));

    let (_, v) = t.get_json("/api/status").await;
    assert_eq!(v["sessions"][0]["filename"], "a.txt");
}

#[tokio::test]
async fn unknown_device_is_server_error() {
    let t = TestApp::new();
    let (status, v) = t
        .post("/api/connect", json!({ "path": "COM9", "logName": "a" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(v["error"].as_str().unwrap().contains("COM9"));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let t = TestApp::new();
    let (status, v) = t.post("/api/disconnect", json!({ "path": "COM1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["message"].as_str().is_some());

    let (status, _) = t.post("/api/disconnect", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn disconnect_with_close_fault_still_succeeds() {
    let t = TestApp::new();
    t.post("/api/connect", json!({ "path": "COM1", "logName": "a" }))
        .await;
    t.mock.fail_next_close("COM1");

    let (status, _) = t.post("/api/disconnect", json!({ "path": "COM1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!t.state.sessions.is_open("COM1"));
}

// ── Ingress ──────────────────────────────────────────────────────────

#[tokio::test]
async fn device_lines_are_polled_back() {
    let t = TestApp::new();
    t.post("/api/connect", json!({ "path": "COM2", "logName": "bench" }))
        .await;
    t.mock.push_line("COM2", "temp=21.5").await;
    t.mock.push_line("COM2", "temp=21.6").await;

    let mut content = String::new();
    for _ in 0..200 {
        content = t.content("bench").await;
        if content.lines().count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let bodies: Vec<&str> = content
        .lines()
        .map(|l| l.split_once("] ").unwrap().1)
        .collect();
    assert_eq!(bodies, vec!["temp=21.5", "temp=21.6"]);
}

#[tokio::test]
async fn filename_endpoint_rebinds_device_and_default() {
    let t = TestApp::new();
    t.post("/api/connect", json!({ "path": "COM1", "logName": "first" }))
        .await;

    let (status, v) = t
        .post("/api/filename", json!({ "path": "COM1", "logName": "second" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["filename"], "second.txt");
    let (_, v) = t.get_json("/api/status").await;
    assert_eq!(v["sessions"][0]["filename"], "second.txt");

    let (status, _) = t
        .post("/api/filename", json!({ "path": "COM2", "logName": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.post("/api/filename", json!({ "filename": "fallback" })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, v) = t.get_json("/api/status").await;
    assert_eq!(v["defaultFilename"], "fallback.txt");
}

// ── Mock & data ──────────────────────────────────────────────────────

#[tokio::test]
async fn mock_requires_data_and_name() {
    let t = TestApp::new();
    let (status, _) = t.post("/api/mock", json!({ "logName": "a" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = t.post("/api/mock", json!({ "data": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn data_is_empty_before_anything_is_written() {
    let t = TestApp::new();
    let (status, v) = t.get_json("/api/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["content"], "");
    assert_eq!(t.content("nothing-yet").await, "");
}

// ── File serving ─────────────────────────────────────────────────────

#[tokio::test]
async fn serves_log_files() {
    let t = TestApp::new();
    t.post("/api/mock", json!({ "data": "raw line", "logName": "served" }))
        .await;

    let (status, body) = t.get("/served.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.ends_with("] raw line\n"));

    let (status, _) = t.get("/absent.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejects_traversal_in_file_names() {
    let t = TestApp::new();
    for uri in ["/..%2Fsecret.txt", "/a%5Cb.txt", "/..secret.txt"] {
        let (status, _) = t.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn other_paths_fall_through_to_static_assets() {
    let t = TestApp::new();
    let (status, body) = t.get("/index.html").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("SerialLog"));

    let (status, body) = t.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("SerialLog"));

    let (status, _) = t.get("/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
