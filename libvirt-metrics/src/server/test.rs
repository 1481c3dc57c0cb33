use std::{io::Write, sync::Arc};

use http::{header, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use tempfile::NamedTempFile;

use libvirt_metrics_common::{
    collector::{Collector, CollectorConfig},
    hypervisor::snapshot::SnapshotHypervisor,
    openmetrics::OPENMETRICS_TEXT_CONTENT_TYPE,
};

use super::{handle, ScrapeState};

const SNAPSHOT: &str = r#"[
    {
        "uuid": "2f2a8b8c-3c3f-4b7e-9d52-6b0c7c7a1e01",
        "name": "instance-0001",
        "stats": {
            "block.0.rd.bytes": 10,
            "block.0.wr.bytes": 5,
            "block.0.name": "vda",
            "cpu.time": 100
        }
    }
]"#;

fn state(path: &std::path::Path) -> Arc<ScrapeState<SnapshotHypervisor>> {
    Arc::new(ScrapeState::new(Collector::new(
        SnapshotHypervisor::new(path),
        CollectorConfig::default(),
    )))
}

type TestResponse = Response<Full<Bytes>>;

async fn send(
    state: Arc<ScrapeState<SnapshotHypervisor>>,
    method: Method,
    path: &str,
) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(())
        .unwrap();

    handle(state, request).await.unwrap()
}

async fn body_text(response: TestResponse) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn metrics_endpoint() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SNAPSHOT.as_bytes()).unwrap();

    let response = send(state(file.path()), Method::GET, "/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        OPENMETRICS_TEXT_CONTENT_TYPE
    );

    let text = body_text(response).await;
    let uuid = "2f2a8b8c-3c3f-4b7e-9d52-6b0c7c7a1e01";

    assert!(text.contains(&format!(
        "libvirt_active_info{{uuid=\"{uuid}\",name=\"instance-0001\"}} 1\n"
    )));
    assert!(text.contains(&format!(
        "libvirt_block_info{{uuid=\"{uuid}\",unit=\"0\",name=\"vda\"}} 1\n"
    )));
    assert!(text.contains(&format!(
        "libvirt_block_rd_bytes{{uuid=\"{uuid}\",unit=\"0\"}} 10\n"
    )));
    assert!(text.contains(&format!(
        "libvirt_block_wr_bytes{{uuid=\"{uuid}\",unit=\"0\"}} 5\n"
    )));
    assert!(text.contains(&format!("libvirt_cpu_time{{uuid=\"{uuid}\"}} 100\n")));
    assert!(text.ends_with("# EOF\n"));
}

#[tokio::test]
async fn snapshot_is_reread() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[]").unwrap();

    let state = state(file.path());

    let first = send(state.clone(), Method::GET, "/metrics").await;
    assert_eq!(body_text(first).await, "# EOF\n");

    std::fs::write(file.path(), SNAPSHOT).unwrap();

    let second = send(state, Method::GET, "/metrics").await;
    assert!(body_text(second).await.contains("libvirt_cpu_time"));
}

#[tokio::test]
async fn collection_failure() {
    let state = state(std::path::Path::new("/nonexistent/snapshot.json"));
    let response = send(state, Method::GET, "/metrics").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.starts_with("collection failed"));
}

#[tokio::test]
async fn other_routes() {
    let state = state(std::path::Path::new("/nonexistent/snapshot.json"));

    let response = send(state.clone(), Method::GET, "/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(state, Method::POST, "/metrics").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
