#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use file_vault::{
    build_state, db, middleware::AuthGate, routes::routes::routes,
    services::object_store::MemoryObjectStore,
};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-secret";
pub const BOUNDARY: &str = "vault-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub objects: Arc<MemoryObjectStore>,
}

pub async fn app() -> TestApp {
    let pool = db::connect_in_memory().await.unwrap();
    let objects = Arc::new(MemoryObjectStore::new());
    let state = build_state(Arc::new(pool), objects.clone(), SECRET);
    TestApp {
        router: routes(state, 1024 * 1024),
        objects,
    }
}

pub fn token(owner: &str) -> String {
    AuthGate::new(SECRET)
        .issue(owner, Duration::from_secs(300))
        .unwrap()
}

pub fn bearer(owner: &str) -> String {
    format!("Bearer {}", token(owner))
}

/// Hand-built multipart body with an optional file part and key part.
pub fn multipart_body(file: Option<(&str, &str, &[u8])>, key: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, content_type, data)) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(key) = key {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"encryption_key\"\r\n\r\n");
        body.extend_from_slice(key);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(auth: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post("/api/upload").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn download_request(auth: &str, file_id: &str, key: &str) -> Request<Body> {
    let form = format!("encryption_key={}", urlencode(key));
    Request::post(format!("/api/download/{}", file_id))
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

pub fn list_request(auth: &str) -> Request<Body> {
    Request::get("/api/files")
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(router, request).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Upload `data` as `name` for `owner`, returning the new file id.
pub async fn upload(router: &Router, owner: &str, name: &str, data: &[u8], key: &str) -> String {
    let body = multipart_body(Some((name, "text/plain", data)), Some(key.as_bytes()));
    let (status, json) = send_json(router, upload_request(Some(bearer(owner).as_str()), body)).await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {}", json);
    json["fileId"].as_str().unwrap().to_string()
}
