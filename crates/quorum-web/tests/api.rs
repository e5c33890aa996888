//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use quorum_common::entities::User;
use quorum_db::migrations::Migrator;
use quorum_db::{Database, RecordStore};
use quorum_web::router::build_router;
use quorum_web::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> (Router, tempfile::TempDir) {
    let db = Database::open_in_memory().await.unwrap();
    Migrator::builtin().up(&db).await.unwrap();
    let files = tempfile::tempdir().unwrap();
    let state = AppState::new(RecordStore::new(db), files.path().to_path_buf());
    (build_router(state), files)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_and_login(app: &Router, username: &str) -> (String, String) {
    let (status, user) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.org"),
            "password": "correct horse",
            "name": username,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user_id = user["id"].as_str().unwrap().to_string();

    let (status, session) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "identity": username, "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (user_id, session["token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn health_reports_collections() {
    let (app, _files) = test_app().await;
    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["records"]["research_projects"], json!(0));
}

#[tokio::test]
async fn crud_round_trip_with_visibility() {
    let (app, _files) = test_app().await;
    let (alice, alice_token) = register_and_login(&app, "alice").await;
    let (_bob, bob_token) = register_and_login(&app, "bob").await;

    // anonymous creates are rejected
    let (status, _) = send(
        &app,
        "POST",
        "/api/collections/research_projects/records",
        None,
        Some(json!({ "title": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, project) = send(
        &app,
        "POST",
        "/api/collections/research_projects/records",
        Some(&alice_token),
        Some(json!({ "title": "Pan-genome atlas", "public": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let project_id = project["id"].as_str().unwrap().to_string();
    assert_eq!(project["collaborators"], json!([alice]));

    // private record: bob gets a 404, alice sees it with expansion
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/collections/research_projects/records/{project_id}"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/collections/research_projects/records/{project_id}?expand=collaborators"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expand"]["collaborators"][0]["username"], json!("alice"));

    // bob cannot edit, alice can
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/collections/research_projects/records/{project_id}"),
        Some(&bob_token),
        Some(json!({ "title": "Hijack" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/collections/research_projects/records/{project_id}"),
        Some(&alice_token),
        Some(json!({ "public": true, "tags": ["genomics"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["public"], json!(true));

    // now bob's list sees it through a filter
    let (status, listed) = send(
        &app,
        "GET",
        "/api/collections/research_projects/records?filter=title%20~%20%27genome%27",
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total_items"], json!(1));

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/collections/research_projects/records/{project_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/collections/research_projects/records/{project_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_requests_are_400s() {
    let (app, _files) = test_app().await;
    let (_alice, token) = register_and_login(&app, "alice").await;

    // broken filter
    let (status, body) = send(
        &app,
        "GET",
        "/api/collections/models/records?filter=name%20~",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid filter"));

    // unknown field
    let (status, _) = send(
        &app,
        "POST",
        "/api/collections/models/records",
        Some(&token),
        Some(json!({ "name": "m", "nonsense": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown collection
    let (status, _) = send(
        &app,
        "GET",
        "/api/collections/widgets/records",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // invalid token
    let (status, _) = send(
        &app,
        "GET",
        "/api/collections/models/records",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn model_file_upload_and_download() {
    let (app, _files) = test_app().await;
    let (_alice, token) = register_and_login(&app, "alice").await;

    let (status, model) = send(
        &app,
        "POST",
        "/api/collections/models/records",
        Some(&token),
        Some(json!({ "name": "resnet-lite", "public": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let model_id = model["id"].as_str().unwrap().to_string();

    let boundary = "quorumboundary";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"weights.onnx\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         fake-model-bytes\r\n\
         --{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/files/models/{model_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let record: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(record["files"], json!(["weights.onnx"]));

    // public record: the artifact is downloadable without auth
    let req = Request::builder()
        .method("GET")
        .uri(format!("/files/models/{model_id}/weights.onnx"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"fake-model-bytes");

    // unlisted filenames 404 even if a path exists
    let req = Request::builder()
        .method("GET")
        .uri(format!("/files/models/{model_id}/missing.onnx"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn avatar_upload_keeps_the_user_deserializable() {
    let (app, _files) = test_app().await;
    let (alice, token) = register_and_login(&app, "alice").await;

    let boundary = "quorumboundary";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"me.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         png-bytes\r\n\
         --{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/files/users/{alice}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let record: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(record["avatar"], json!(["me.png"]));

    // the typed entity still round-trips, and so does a fresh login
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/collections/users/records/{alice}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user: User = serde_json::from_value(body).unwrap();
    assert_eq!(user.avatar, vec!["me.png"]);

    let (status, session) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "identity": "alice", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user: User = serde_json::from_value(session["user"].clone()).unwrap();
    assert_eq!(user.avatar, vec!["me.png"]);

    // and the avatar serves back under the file URL
    let req = Request::builder()
        .method("GET")
        .uri(format!("/files/users/{alice}/me.png"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
