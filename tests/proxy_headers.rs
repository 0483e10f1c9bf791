//! Forwarding header behaviour, observed through the echo backend.

use std::sync::Arc;

use mini_proxy::mock_backend::{self, Service};
use mini_proxy::observability::MemoryAccessLog;
use serde_json::Value;

mod common;

async fn echo_proxy() -> (std::net::SocketAddr, std::net::SocketAddr, Arc<MemoryAccessLog>) {
    let backend = common::spawn_backend(mock_backend::router(Service::Echo)).await;
    let log = Arc::new(MemoryAccessLog::new());
    let (proxy, _shutdown) = common::spawn_proxy(common::proxy_config(backend), log.clone()).await;
    (proxy, backend, log)
}

fn header<'a>(echo: &'a Value, name: &str) -> &'a str {
    echo["headers"][name][0].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_generated_request_id_is_forwarded_and_echoed() {
    let (proxy, _, log) = echo_proxy().await;

    let res = common::client()
        .get(format!("http://{}/echo", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let returned = res.headers()["x-request-id"].to_str().unwrap().to_string();
    let echo: Value = res.json().await.unwrap();

    let forwarded = header(&echo, "x-request-id");
    assert!(!forwarded.is_empty());
    assert!(forwarded.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(forwarded, returned);

    assert_eq!(log.requests()[0].id, forwarded);
    assert_eq!(log.responses()[0].id, forwarded);
}

#[tokio::test]
async fn test_inbound_request_id_is_preserved() {
    let (proxy, _, log) = echo_proxy().await;

    let res = common::client()
        .get(format!("http://{}/echo", proxy))
        .header("X-Request-ID", "client-chosen-7")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "client-chosen-7");
    let echo: Value = res.json().await.unwrap();

    assert_eq!(echo["headers"]["x-request-id"].as_array().unwrap().len(), 1);
    assert_eq!(header(&echo, "x-request-id"), "client-chosen-7");
    assert_eq!(log.requests()[0].id, "client-chosen-7");
}

#[tokio::test]
async fn test_forwarding_headers() {
    let (proxy, backend, _) = echo_proxy().await;

    let echo: Value = common::client()
        .get(format!("http://{}/echo", proxy))
        .header("X-Forwarded-For", "198.51.100.1")
        .header("X-Origin-Host", "spoofed.example")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(header(&echo, "x-forwarded-for"), "198.51.100.1, 127.0.0.1");
    assert_eq!(header(&echo, "x-forwarded-proto"), "http");
    assert_eq!(header(&echo, "x-origin-host"), backend.to_string());
}

#[tokio::test]
async fn test_path_and_query_are_kept() {
    let (proxy, backend, log) = echo_proxy().await;

    let echo: Value = common::client()
        .get(format!("http://{}/echo?sleep=0&tag=a&tag=b", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(echo["path"], "/echo");
    assert_eq!(echo["query"]["tag"], serde_json::json!(["a", "b"]));
    assert_eq!(
        log.requests()[0].url,
        format!("http://{}/echo?sleep=0&tag=a&tag=b", backend)
    );
}

#[tokio::test]
async fn test_access_log_records_pair_per_request() {
    let (proxy, _, log) = echo_proxy().await;
    let client = common::client();

    for _ in 0..3 {
        let res = client.get(format!("http://{}/echo", proxy)).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    let requests = log.requests();
    let responses = log.responses();
    assert_eq!(requests.len(), 3);
    assert_eq!(responses.len(), 3);
    for (req, res) in requests.iter().zip(&responses) {
        assert_eq!(req.id, res.id);
        assert_eq!(req.method, "GET");
        assert!(req.remote_addr.starts_with("127.0.0.1:"));
        assert_eq!(res.status, "200 OK");
    }
}
