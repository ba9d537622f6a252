//! Integration tests for warga-admin HTTP endpoints
//!
//! Requests go straight through the router with `oneshot`; no socket.

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use helpers::*;
use warga_admin::build_router;

async fn setup_app() -> Router {
    build_router(test_state().await)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Should read body")
        .to_bytes()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Should parse JSON")
}

/// Register the admin account and return its bearer token
async fn sign_up(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({"displayName": "Admin RW", "email": "admin@rw05.id", "password": "rahasia"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn family_body(kepala: &str) -> Value {
    json!({
        "keluarga": {"noKK": NO_KK, "alamat": "Blok A No. 1"},
        "kepala": serde_json::to_value(head_form(kepala, "3203010101010002")).unwrap(),
    })
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = setup_app().await;

    let response = app.oneshot(empty_request("GET", "/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "warga-admin");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = setup_app().await;

    for uri in ["/api/keluarga", "/api/statistik", "/api/auth/me", "/api/export"] {
        let response = app.clone().oneshot(empty_request("GET", uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let response = app
        .oneshot(empty_request("GET", "/api/keluarga", Some("bukan-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "auth/not-signed-in");
}

#[tokio::test]
async fn test_auth_errors_carry_user_messages() {
    let app = setup_app().await;
    sign_up(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({"displayName": "Admin RW", "email": "admin@rw05.id", "password": "rahasia"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Email sudah terdaftar. Silakan masuk."
    );

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"email": "admin@rw05.id", "password": "keliru"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "auth/invalid-credential");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/federated",
            None,
            json!({"email": "orang@luar.id"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Domain tidak diizinkan. Hubungi admin."
    );
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["displayName"], "Admin RW");

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/api/auth/logout", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(empty_request("GET", "/api/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_with_wrong_old_password() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/profile/password",
            Some(&token),
            json!({"oldPassword": "keliru", "newPassword": "baru123", "confirmPassword": "baru123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["message"], "Password lama salah.");
}

// =============================================================================
// Families and members
// =============================================================================

#[tokio::test]
async fn test_family_lifecycle() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/keluarga", Some(&token), family_body("Budi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let family_id = created["familyId"].as_str().unwrap().to_string();
    let head_id = created["headId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/api/keluarga/{}", family_id), Some(&token)))
        .await
        .unwrap();
    let family = body_json(response).await;
    assert_eq!(family["kepalaKeluarga"], "Budi");
    assert_eq!(family["anggota"][0]["statusHubungan"], "Kepala Keluarga");

    // Head member is guarded
    let response = app
        .clone()
        .oneshot(empty_request(
            "DELETE",
            &format!("/api/keluarga/{}/anggota/{}?confirm=true", family_id, head_id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Unconfirmed delete does nothing
    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/api/keluarga/{}", family_id), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(empty_request(
            "DELETE",
            &format!("/api/keluarga/{}?confirm=true", family_id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(empty_request("GET", &format!("/api/keluarga/{}", family_id), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_errors_name_fields() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let body = json!({
        "keluarga": {"noKK": NO_KK, "alamat": ""},
        "kepala": serde_json::to_value(head_form("Budi", "320301010101000")).unwrap(),
    });
    let response = app
        .oneshot(json_request("POST", "/api/keluarga", Some(&token), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    let fields: Vec<&str> = body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["alamat", "nik"]);
}

#[tokio::test]
async fn test_members_and_statistics() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/keluarga", Some(&token), family_body("Budi")))
        .await
        .unwrap();
    let family_id = body_json(response).await["familyId"]
        .as_str()
        .unwrap()
        .to_string();

    let mut istri = serde_json::to_value(member_form("Siti", "3203010101010003", "Istri")).unwrap();
    istri["jenisKelamin"] = json!("Perempuan");
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/keluarga/{}/anggota", family_id),
            Some(&token),
            istri,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/api/keluarga/{}/anggota", family_id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(empty_request("GET", "/api/statistik", Some(&token)))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"totalKk": 1, "totalWarga": 2, "lakiLaki": 1, "perempuan": 1})
    );
}

// =============================================================================
// Import / export
// =============================================================================

#[tokio::test]
async fn test_import_then_export_over_http() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let file = csv_file(&[
        csv_row(NO_KK, "Budi", "1234567890120001", "Kepala Keluarga"),
        csv_row(NO_KK, "Rina", "1234567890120002", "Anak"),
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(file))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["familiesCreated"], 1);
    assert_eq!(report["membersCreated"], 2);

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/export", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"data-warga-"));
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(text.lines().count(), 3);

    let response = app
        .oneshot(empty_request("GET", "/api/template", Some(&token)))
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"template-data-warga.csv\""
    );
}

#[tokio::test]
async fn test_unreadable_import_is_bad_request() {
    let app = setup_app().await;
    let token = sign_up(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "DECODE_ERROR");
}
