use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use fgate_kernel::domain::config::ApiConfig;
use fgate_kernel::server::ApiState;
use fgate_storage::Storage;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "fgate-test-boundary";

struct Harness {
    _temp: TempDir,
    app: Router,
    storage: Storage,
}

async fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let storage = Storage::builder().root(temp.path().join("shared")).connect().await.unwrap();

    let mut config = ApiConfig::default();
    config.security.api_key = "test-key".to_owned();
    let state = ApiState::builder().config(config).storage(storage.clone()).build().unwrap();

    let (router, _api) = fgate_files::router().split_for_parts();
    Harness { _temp: temp, app: router.with_state(state), storage }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn call(&self, method: Method, uri: &str) -> Response {
        self.send(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn upload(&self, dir: &str, filename: &str, data: &[u8]) -> Response {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/upload?path={dir}"))
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

fn ranged(uri: &str, range: &str) -> Request<Body> {
    Request::builder().uri(uri).header(header::RANGE, range).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn upload_list_read_delete_scenario() {
    let h = harness().await;

    let response = h.call(Method::POST, "/mkdir?path=&name=docs").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json(response).await, serde_json::json!({ "folder": "docs", "created_in": "" }));

    let response = h.upload("docs", "a.txt", b"hello world").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        json(response).await,
        serde_json::json!({ "uploaded": "a.txt", "path": "docs", "size": 11 })
    );

    let listing = json(h.call(Method::GET, "/files?path=docs").await).await;
    assert_eq!(listing["path"], "docs");
    assert_eq!(listing["items"][0]["name"], "a.txt");
    assert_eq!(listing["items"][0]["is_dir"], false);
    assert_eq!(listing["items"][0]["size"], 11);
    assert!(listing["items"][0]["modified"].as_f64().unwrap() > 0.0);

    let response = h.send(ranged("/files/docs/a.txt", "bytes=0-4")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-4/11");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
    assert_eq!(bytes(response).await, b"hello");

    let response = h.call(Method::DELETE, "/files?path=docs&name=a.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["deleted"], "a.txt");

    let response = h.call(Method::GET, "/files/docs/a.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["detail"], "Not found");
}

#[tokio::test]
async fn full_read_carries_metadata_headers() {
    let h = harness().await;
    h.storage.upload("", "clip.mp4", b"0123456789").await.unwrap();

    let response = h.call(Method::GET, "/files/clip.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CONTENT_LENGTH], "10");
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert!(headers.contains_key(header::LAST_MODIFIED));
    assert!(!headers.contains_key(header::CONTENT_RANGE));
    assert!(headers[header::CONTENT_DISPOSITION].to_str().unwrap().starts_with("attachment;"));
    assert_eq!(bytes(response).await, b"0123456789");

    let response = h.call(Method::GET, "/stream/clip.mp4").await;
    assert!(response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().starts_with("inline;"));
}

#[tokio::test]
async fn download_is_named_after_the_resolved_file() {
    let h = harness().await;
    h.storage.upload("docs", "a.txt", b"abc").await.unwrap();

    for uri in ["/files/docs/a.txt/.", "/files/docs/x/../a.txt"] {
        let response = h.call(Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"a.txt\"; filename*=UTF-8''a.txt",
            "{uri}"
        );
    }
}

#[tokio::test]
async fn suffix_range_on_stream_route() {
    let h = harness().await;
    h.storage.upload("media", "song.mp3", b"abcdefghij").await.unwrap();

    let response = h.send(ranged("/stream/media/song.mp3", "bytes=-3")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 7-9/10");
    assert_eq!(bytes(response).await, b"hij");
}

#[tokio::test]
async fn bad_ranges_map_to_400_and_416() {
    let h = harness().await;
    h.storage.upload("", "f.bin", b"0123456789").await.unwrap();

    let response = h.send(ranged("/files/f.bin", "bytes=10-10")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");

    let response = h.send(ranged("/files/f.bin", "bytes=0-1,4-5")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["detail"], "Malformed Range header");
}

#[tokio::test]
async fn traversal_is_rejected_without_leaking_paths() {
    let h = harness().await;

    for uri in ["/files?path=../..", "/files/..%2F..%2Fetc%2Fpasswd", "/stream/a/../../x"] {
        let response = h.call(Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json(response).await;
        assert_eq!(body["detail"], "Invalid path", "{uri}");
        assert!(!body.to_string().contains(h.storage.root().to_str().unwrap()));
    }

    let response = h.call(Method::DELETE, "/files?path=&name=..").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_orders_directories_first() {
    let h = harness().await;
    h.storage.upload("", "b.txt", b"b").await.unwrap();
    h.storage.mkdir("", "zeta").await.unwrap();
    h.storage.upload("", "a.txt", b"a").await.unwrap();

    let listing = json(h.call(Method::GET, "/files").await).await;
    let names: Vec<_> =
        listing["items"].as_array().unwrap().iter().map(|item| item["name"].clone()).collect();
    assert_eq!(names, ["zeta", "a.txt", "b.txt"]);
    assert_eq!(listing["items"][0]["size"], Value::Null);
    assert_eq!(listing["path"], "");

    let response = h.call(Method::GET, "/files?path=missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mutations_report_conflicts() {
    let h = harness().await;
    h.storage.upload("", "a.txt", b"a").await.unwrap();
    h.storage.upload("", "b.txt", b"b").await.unwrap();
    h.storage.upload("full", "inner.txt", b"x").await.unwrap();

    let response = h.call(Method::PUT, "/rename?path=&old_name=a.txt&new_name=b.txt").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = h.call(Method::PUT, "/rename?path=&old_name=a.txt&new_name=c.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!({ "from": "a.txt", "to": "c.txt" }));

    let response = h.call(Method::PUT, "/rename?path=&old_name=gone.txt&new_name=d.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = h.call(Method::DELETE, "/files?path=&name=full").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json(response).await["detail"], "Directory not empty");

    let response = h.call(Method::POST, "/mkdir?path=&name=full").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["created_in"], "");

    let response = h.call(Method::POST, "/mkdir?path=&name=c.txt").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = h.upload("", "full", b"data").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn upload_overwrites_and_creates_directories() {
    let h = harness().await;

    assert_eq!(h.upload("deep/er", "n.txt", b"first").await.status(), StatusCode::CREATED);
    assert_eq!(h.upload("deep/er", "n.txt", b"second").await.status(), StatusCode::CREATED);

    let response = h.call(Method::GET, "/files/deep/er/n.txt").await;
    assert_eq!(bytes(response).await, b"second");
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let h = harness().await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
    );

    let response = h
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/upload?path=")
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.storage.list("").await.unwrap().is_empty());
}
