use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use fgate_kernel::domain::config::ApiConfig;
use fgate_server::Server;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const KEY: &str = "s3cret-key";
const BOUNDARY: &str = "fgate-server-boundary";

async fn app_with(configure: impl FnOnce(&mut ApiConfig)) -> (TempDir, Router) {
    let temp = TempDir::new().unwrap();
    let mut cfg = ApiConfig::default();
    cfg.storage.root = temp.path().join("shared");
    cfg.security.api_key = KEY.to_owned();
    configure(&mut cfg);

    let server = Server::builder().config(cfg).build().await.unwrap();
    let router = server.router().unwrap();
    (temp, router)
}

async fn app() -> (TempDir, Router) {
    app_with(|_| {}).await
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn authed(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).header("x-api-key", KEY).body(Body::empty()).unwrap()
}

fn multipart(uri: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("x-api-key", KEY)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (_temp, app) = app().await;

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, no-cache, must-revalidate");

    let body = json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["root"], "shared");
    assert!(body["uptime"].is_u64());
}

#[tokio::test]
async fn docs_are_public() {
    let (_temp, app) = app().await;
    assert_eq!(send(&app, get("/api")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_wrong_key_is_rejected_before_touching_disk() {
    let (temp, app) = app().await;

    let response = send(&app, get("/files")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(json(response).await["detail"], "Unauthorized");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/mkdir?path=&name=intruder")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::UNAUTHORIZED);
    assert!(!temp.path().join("shared").join("intruder").exists());

    let response = send(&app, get("/files/..%2F..%2Fetc%2Fpasswd")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn every_credential_form_is_accepted() {
    let (_temp, app) = app().await;

    assert_eq!(send(&app, authed(Method::GET, "/files")).await.status(), StatusCode::OK);

    let bearer = Request::builder()
        .uri("/files")
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, bearer).await.status(), StatusCode::OK);

    let response = send(&app, get(&format!("/files?path=&key={KEY}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scenario_holds_over_the_router() {
    let (_temp, app) = app().await;

    let response = send(&app, authed(Method::POST, "/mkdir?path=&name=docs")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = send(&app, authed(Method::POST, "/mkdir?path=&name=docs")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, multipart("/upload?path=docs", "a.txt", b"hello world")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let listing = json(send(&app, authed(Method::GET, "/files?path=docs")).await).await;
    assert_eq!(listing["items"].as_array().unwrap().len(), 1);
    assert_eq!(listing["items"][0]["size"], 11);

    let request = Request::builder()
        .uri("/stream/docs/a.txt")
        .header("x-api-key", KEY)
        .header(header::RANGE, "bytes=0-4")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-4/11");
    assert_eq!(&to_bytes(response.into_body(), usize::MAX).await.unwrap()[..], b"hello");

    let response = send(&app, authed(Method::DELETE, "/files?path=docs&name=a.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, authed(Method::GET, "/files/docs/a.txt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_body_limit_is_enforced() {
    let (temp, app) = app_with(|cfg| cfg.storage.max_upload_bytes = 64).await;

    let response = send(&app, multipart("/upload?path=", "big.bin", &[7u8; 4096])).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!temp.path().join("shared").join("big.bin").exists());
}

#[tokio::test]
async fn cors_preflight_for_configured_origin() {
    let (_temp, app) = app_with(|cfg| {
        cfg.security.cors.allowed_origins = vec!["https://player.example".to_owned()];
    })
    .await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/files")
        .header(header::ORIGIN, "https://player.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://player.example"
    );
}

#[tokio::test]
async fn build_rejects_invalid_configuration() {
    let temp = TempDir::new().unwrap();

    let mut cfg = ApiConfig::default();
    cfg.storage.root = temp.path().join("shared");
    assert!(Server::builder().config(cfg.clone()).build().await.is_err());

    cfg.security.api_key = KEY.to_owned();
    cfg.storage.chunk_size = 0;
    assert!(Server::builder().config(cfg.clone()).build().await.is_err());

    cfg.storage.chunk_size = 4096;
    cfg.storage.create = false;
    cfg.storage.root = temp.path().join("missing");
    assert!(Server::builder().config(cfg).build().await.is_err());
}
