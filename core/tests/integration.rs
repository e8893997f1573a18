//! End-to-end tests against the live mock gateway.
//!
//! # Design
//! Starts the mock server on a random port, then drives `RequestExecutor`
//! over real HTTP with the production ureq transport. Covers the success,
//! rejection, timeout and transport-failure paths the boolean contract
//! collapses, and checks through `/echo` exactly what went on the wire.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use restbridge_core::{
    table_url, Config, Diagnostic, ExecutionContext, ExecutorConfig, FailureKind, PoolConfig,
    RequestDescriptor, RequestExecutor,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const API_KEY: &str = mock_server::DEFAULT_API_KEY;

/// Route request logs to the test output; `RUST_LOG=restbridge_core=debug` shows them.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
    init_logging();
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn base(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

fn setup(config: ExecutorConfig) -> (SocketAddr, ExecutionContext, RequestExecutor) {
    let addr = start_server();
    let context = ExecutionContext::new(&PoolConfig::default()).unwrap();
    let executor = RequestExecutor::new(&context, config);
    (addr, context, executor)
}

fn echo(executor: &RequestExecutor, addr: SocketAddr, method: &str, body: Option<&str>) -> Value {
    let response = executor
        .send(RequestDescriptor::new(
            &format!("{}/echo", base(addr)),
            method,
            body,
            API_KEY,
        ))
        .unwrap();
    serde_json::from_str(&response.body).unwrap()
}

#[test]
fn insert_and_read_back() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    let url = table_url(&base(addr), "vr_sessions");

    // Step 1: insert a row.
    let body = r#"{"id":"s1","user_id":"u1","duration":42.5}"#;
    assert!(executor.execute(&url, "POST", Some(body), API_KEY));

    // Step 2: the insert answers 201 with the row when asked for a representation.
    let response = executor
        .send(RequestDescriptor::new(&url, "POST", Some(r#"{"id":"s2"}"#), API_KEY))
        .unwrap();
    assert_eq!(response.status, 201);
    let rows: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(rows[0]["id"], "s2");

    // Step 3: filtered read.
    let response = executor
        .send(RequestDescriptor::new(
            &format!("{url}?id=eq.s1"),
            "GET",
            None,
            API_KEY,
        ))
        .unwrap();
    let rows: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["duration"], 42.5);

    context.shutdown();
}

#[test]
fn patch_and_delete_round_trip() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    let url = table_url(&base(addr), "items");

    assert!(executor.execute(&url, "POST", Some(r#"{"id":"x","qty":1}"#), API_KEY));
    assert!(executor.execute(&format!("{url}?id=eq.x"), "PATCH", Some(r#"{"qty":5}"#), API_KEY));

    let response = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap();
    let rows: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(rows[0]["qty"], 5);

    assert!(executor.execute(&format!("{url}?id=eq.x"), "DELETE", None, API_KEY));
    let response = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap();
    assert_eq!(response.body.trim(), "[]");

    context.shutdown();
}

#[test]
fn missing_apikey_header_is_diagnosed() {
    let config = ExecutorConfig::default().with_dual_auth_header(false);
    let (addr, context, executor) = setup(config);
    let url = table_url(&base(addr), "items");

    assert!(!executor.execute(&url, "POST", Some("{}"), API_KEY));
    let err = executor
        .send(RequestDescriptor::new(&url, "POST", Some("{}"), API_KEY))
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.kind(), FailureKind::ClientStatus);
    assert_eq!(err.diagnostic(), Some(Diagnostic::MissingApiKey));

    context.shutdown();
}

#[test]
fn wrong_key_is_diagnosed() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    let url = table_url(&base(addr), "items");

    let err = executor
        .send(RequestDescriptor::new(&url, "GET", None, "not-the-key"))
        .unwrap_err();
    assert_eq!(err.diagnostic(), Some(Diagnostic::InvalidApiKey));

    context.shutdown();
}

#[test]
fn unknown_table_and_bad_json_fail() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    let err = executor
        .send(RequestDescriptor::new(
            &table_url(&base(addr), "nope"),
            "GET",
            None,
            API_KEY,
        ))
        .unwrap_err();
    assert_eq!(err.diagnostic(), Some(Diagnostic::NotFound));

    let err = executor
        .send(RequestDescriptor::new(
            &table_url(&base(addr), "items"),
            "POST",
            Some("{broken"),
            API_KEY,
        ))
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.diagnostic(), Some(Diagnostic::MalformedBody));

    context.shutdown();
}

#[test]
fn wire_headers_match_gateway_contract() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    let echoed = echo(&executor, addr, "POST", Some("{}"));
    let headers = &echoed["headers"];
    assert_eq!(echoed["method"], "POST");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["authorization"], format!("Bearer {API_KEY}"));
    assert_eq!(headers["apikey"], API_KEY);
    assert_eq!(headers["prefer"], "return=representation");

    context.shutdown();
}

#[test]
fn body_reaches_server_verbatim() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    let body = "{\"a\": \"caf\u{e9}\",\n  \"b\": [1, 2]}\n";
    let echoed = echo(&executor, addr, "PUT", Some(body));
    assert_eq!(echoed["body"], body);

    context.shutdown();
}

#[test]
fn get_sends_no_body() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    let echoed = echo(&executor, addr, "GET", None);
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["body"], "");

    let echoed = echo(&executor, addr, "POST", Some(""));
    assert_eq!(echoed["body"], "");

    context.shutdown();
}

#[test]
fn status_range_decides_the_result() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    for code in [200, 201, 204, 299] {
        let url = format!("{}/status/{code}", base(addr));
        assert!(executor.execute(&url, "POST", Some("{}"), API_KEY), "{code}");
    }
    for code in [300, 400, 404, 409, 500, 503] {
        let url = format!("{}/status/{code}", base(addr));
        assert!(!executor.execute(&url, "POST", Some("{}"), API_KEY), "{code}");
    }

    let err = executor
        .send(RequestDescriptor::new(
            &format!("{}/status/503", base(addr)),
            "GET",
            None,
            API_KEY,
        ))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::ServerStatus);

    context.shutdown();
}

#[test]
fn hanging_server_times_out_at_ceiling() {
    let ceiling = Duration::from_millis(500);
    let (addr, context, executor) = setup(ExecutorConfig::default().with_call_timeout(ceiling));
    let url = format!("{}/hang", base(addr));

    let started = Instant::now();
    let err = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(elapsed >= ceiling, "returned early: {elapsed:?}");
    assert!(elapsed < ceiling + Duration::from_secs(2), "overran: {elapsed:?}");

    // The pool keeps serving after a timeout.
    let url = format!("{}/status/200", base(addr));
    assert!(executor.execute(&url, "GET", None, API_KEY));

    context.shutdown();
}

#[test]
fn refused_connection_fails_fast() {
    let context = ExecutionContext::new(&PoolConfig::default()).unwrap();
    let executor = RequestExecutor::new(&context, ExecutorConfig::default());

    // Bind then drop to find a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let url = format!("http://127.0.0.1:{port}/rest/v1/items");

    let started = Instant::now();
    let err = executor
        .send(RequestDescriptor::new(&url, "POST", Some("{}"), API_KEY))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Transport);
    assert!(started.elapsed() < Duration::from_secs(10));

    context.shutdown();
}

#[test]
fn malformed_input_is_false() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    assert!(!executor.execute("not a url", "GET", None, API_KEY));
    assert!(!executor.execute("ftp://example.com/x", "GET", None, API_KEY));
    assert!(!executor.execute(&format!("{}/echo", base(addr)), "TRACE", None, API_KEY));

    context.shutdown();
}

#[test]
fn concurrent_callers_share_one_context() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    let url = table_url(&base(addr), "vr_movement_data");

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let executor = executor.clone();
            let url = url.clone();
            std::thread::spawn(move || {
                let body = format!(r#"{{"id":"m{i}","x":{i}}}"#);
                executor.execute(&url, "POST", Some(&body), API_KEY)
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let response = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap();
    let rows: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 16);

    context.shutdown();
}

#[test]
fn config_from_json_drives_the_executor() {
    let config = Config::from_json(r#"{"executor":{"call_timeout_ms":400}}"#).unwrap();
    let addr = start_server();
    let context = ExecutionContext::new(&config.pool).unwrap();
    let executor = RequestExecutor::new(&context, config.executor);

    let err = executor
        .send(RequestDescriptor::new(
            &format!("{}/hang", base(addr)),
            "POST",
            Some("{}"),
            API_KEY,
        ))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Timeout);

    context.shutdown();
}

#[test]
fn after_shutdown_every_call_is_false() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    context.shutdown();

    let url = format!("{}/status/200", base(addr));
    assert!(!executor.execute(&url, "GET", None, API_KEY));
    let err = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Shutdown);
}

#[test]
fn non_utf8_success_body_still_succeeds() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    let url = format!("{}/latin1", base(addr));

    assert!(executor.execute(&url, "GET", None, API_KEY));
    let response = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "caf\u{FFFD}");

    context.shutdown();
}

#[test]
fn success_body_past_ten_mib_is_drained() {
    let (addr, context, executor) = setup(ExecutorConfig::default());
    let len = 11 * 1024 * 1024;
    let url = format!("{}/large/{len}", base(addr));

    let response = executor
        .send(RequestDescriptor::new(&url, "GET", None, API_KEY))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), len);

    context.shutdown();
}

#[test]
fn body_is_sent_on_bodyless_verbs() {
    let (addr, context, executor) = setup(ExecutorConfig::default());

    for method in ["DELETE", "GET", "OPTIONS"] {
        let echoed = echo(&executor, addr, method, Some(r#"{"id":1}"#));
        assert_eq!(echoed["method"], method);
        assert_eq!(echoed["body"], r#"{"id":1}"#, "{method}: body not transmitted");
    }

    context.shutdown();
}
