//! Prometheus and Graphite backends against a loopback HTTP server.

use std::time::{Duration, SystemTime};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use libra_backend::prometheus::{HttpQueryApi, QueryApi, QueryValue, Range};
use libra_backend::{BackendError, Backender, GraphiteBackend, PrometheusBackend};
use libra_core::{BackendConfig, Rule, Settings};

/// Serve one canned response and hand back the raw request text.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{addr}"), handle)
}

fn conf(kind: &str, host: &str) -> BackendConfig {
    BackendConfig {
        kind: kind.to_string(),
        name: kind.to_string(),
        host: host.to_string(),
        timeout: Some(5),
        ..BackendConfig::default()
    }
}

#[tokio::test]
async fn prometheus_instant_query_round_trip() {
    let (host, server) = serve_once(
        "200 OK",
        r#"{"status":"success","data":{"resultType":"vector","result":[
            {"metric":{"job":"api"},"value":[1700000000.123,"127"]}]}}"#,
    )
    .await;
    let backend = PrometheusBackend::connect("prom", &conf("prometheus", &host)).unwrap();

    let mut rule = Rule::for_metric("up");
    rule.labels.insert("job".to_string(), "api".to_string());
    let value = backend.get_value(&rule).await.unwrap();
    assert_eq!(value, 127.0);

    let request = server.await.unwrap();
    let request_line = request.lines().next().unwrap();
    assert!(
        request_line.starts_with("GET /api/v1/query?query=up%7Bjob%3D%22api%22%7D&time="),
        "unexpected request line: {request_line}"
    );
}

#[tokio::test]
async fn prometheus_error_body_is_upstream_error() {
    let (host, server) = serve_once(
        "400 Bad Request",
        r#"{"status":"error","errorType":"bad_data","error":"1:5: parse error"}"#,
    )
    .await;
    let backend = PrometheusBackend::connect("prom", &conf("prometheus", &host)).unwrap();

    let err = backend
        .get_value(&Rule::for_metric("up{"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Upstream("bad_data: 1:5: parse error".to_string())
    );
    server.await.unwrap();
}

#[tokio::test]
async fn prometheus_range_query_returns_matrix() {
    let (host, server) = serve_once(
        "200 OK",
        r#"{"status":"success","data":{"resultType":"matrix","result":[
            {"metric":{},"values":[[1700000000,"1"],[1700000060,"2"]]}]}}"#,
    )
    .await;
    let api = HttpQueryApi::new(&host, Duration::from_secs(5)).unwrap();

    let end = SystemTime::now();
    let range = Range {
        start: end - Duration::from_secs(60),
        end,
        step: Duration::from_secs(60),
    };
    let value = api.query_range("rate(http_requests_total[5m])", range).await.unwrap();

    let series = match value {
        QueryValue::Matrix(series) => series,
        other => panic!("expected matrix, got {other:?}"),
    };
    assert_eq!(series[0].values, vec![(1700000000.0, 1.0), (1700000060.0, 2.0)]);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/v1/query_range?query=rate%28"));
    assert!(request.contains("&step=60"));
}

#[tokio::test]
async fn prometheus_non_json_failure_is_transport_error() {
    let (host, server) = serve_once("502 Bad Gateway", "upstream unavailable").await;
    let backend = PrometheusBackend::connect("prom", &conf("prometheus", &host)).unwrap();

    let err = backend.get_value(&Rule::for_metric("up")).await.unwrap_err();
    match err {
        BackendError::Transport(msg) => assert!(msg.starts_with("HTTP 502"), "{msg}"),
        other => panic!("expected transport error, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend =
        PrometheusBackend::connect("prom", &conf("prometheus", &format!("http://{addr}")))
            .unwrap();
    let err = backend.get_value(&Rule::for_metric("up")).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn slow_upstream_hits_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let mut conf = conf("prometheus", &format!("http://{addr}"));
    conf.timeout = Some(1);
    let backend = PrometheusBackend::connect("prom", &conf).unwrap();

    let err = backend.get_value(&Rule::for_metric("up")).await.unwrap_err();
    match err {
        BackendError::Transport(msg) => assert!(msg.contains("timed out"), "{msg}"),
        other => panic!("expected timeout, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn graphite_render_with_fallback_password() {
    let (host, server) = serve_once(
        "200 OK",
        r#"[{"target":"web.requests","datapoints":[[10.0,1700000000],[12.5,1700000060],[null,1700000120]]}]"#,
    )
    .await;
    let mut conf = conf("graphite", &host);
    conf.username = "libra".to_string();
    let settings = Settings {
        graphite_password: Some("secret".to_string()),
        ..Settings::default()
    };
    let backend = GraphiteBackend::connect("graphite", &conf, &settings).unwrap();

    let mut rule = Rule::for_metric("web.requests");
    rule.from = Some("-10min".to_string());
    assert_eq!(backend.get_value(&rule).await.unwrap(), 12.5);

    let request = server.await.unwrap().to_lowercase();
    assert!(request.starts_with(
        "get /render?target=web.requests&from=-10min&format=json"
    ));
    assert!(request.contains("authorization: basic bglicme6c2vjcmv0"));
}

#[tokio::test]
async fn graphite_http_error_is_upstream_error() {
    let (host, server) = serve_once("401 Unauthorized", "bad credentials").await;
    let backend =
        GraphiteBackend::connect("graphite", &conf("graphite", &host), &Settings::default())
            .unwrap();

    let err = backend
        .get_value(&Rule::for_metric("web.requests"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Upstream("HTTP 401 Unauthorized: bad credentials".to_string())
    );
    server.await.unwrap();
}
