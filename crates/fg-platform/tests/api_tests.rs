//! Authentication API Integration Tests
//!
//! Requests go through the assembled router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use fg_common::Edition;
use fg_platform::api::{router, ApiState};
use fg_platform::repository::MemoryStore;
use fg_platform::service::{Argon2Config, AuthConfig, AuthenticationService};

fn app(edition: Edition) -> Router {
    let store = Arc::new(MemoryStore::new());
    let config = AuthConfig {
        secret: "api-test-secret-0123456789abcdef".to_string(),
        ..Default::default()
    };
    let auth = AuthenticationService::builder(store, edition, config)
        .argon2(Argon2Config::low_cost())
        .build()
        .unwrap();
    router(ApiState::new(Arc::new(auth)))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn sign_up_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "correct-horse-battery",
        "firstName": "Ada",
        "lastName": "Lovelace"
    })
}

mod authentication_api_tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_then_me() {
        let app = app(Edition::Community);
        let (status, body) = send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["platformRole"], "ADMIN");
        assert_eq!(body["project"]["displayName"], "Default Project");
        assert!(body["user"].get("passwordHash").is_none());

        let token = body["token"].as_str().unwrap().to_string();
        let (status, me) = send(&app, "GET", "/v1/authentication/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["sub"], body["user"]["id"]);
        assert_eq!(me["platformId"], body["platform"]["id"]);
        assert_eq!(me["type"], "USER");
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = app(Edition::Community);
        let (status, body) = send(&app, "GET", "/v1/authentication/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");

        let (status, body) = send(&app, "GET", "/v1/authentication/me", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_BEARER_TOKEN");
    }

    #[tokio::test]
    async fn test_second_self_hosted_sign_up_needs_invitation() {
        let app = app(Edition::Community);
        let (status, _) = send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("bob@example.com"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "NOT_INVITED");
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_conflicts() {
        let app = app(Edition::Cloud);
        send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("ada@example.com"))).await;
        let (status, body) = send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "EXISTING_USER");
    }

    #[tokio::test]
    async fn test_sign_up_without_credential_is_rejected() {
        let app = app(Edition::Community);
        let (status, body) = send(
            &app,
            "POST",
            "/v1/authentication/sign-up",
            None,
            Some(json!({"email": "ada@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION");
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let app = app(Edition::Community);
        send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("ada@example.com"))).await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/authentication/sign-in",
            None,
            Some(json!({"email": "ada@example.com", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "AUTHENTICATION");

        let (status, body) = send(
            &app,
            "POST",
            "/v1/authentication/sign-in",
            None,
            Some(json!({"email": "ada@example.com", "password": "correct-horse-battery"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn test_cloud_sign_in_before_verification() {
        let app = app(Edition::Cloud);
        send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("ada@example.com"))).await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/authentication/sign-in",
            None,
            Some(json!({"email": "ada@example.com", "password": "correct-horse-battery"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "EMAIL_IS_NOT_VERIFIED");
    }
}

mod invitation_api_tests {
    use super::*;

    #[tokio::test]
    async fn test_admin_invites_and_member_signs_up() {
        let app = app(Edition::Community);
        let (_, owner) = send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("owner@corp.com"))).await;
        let token = owner["token"].as_str().unwrap().to_string();

        let (status, invitation) = send(
            &app,
            "POST",
            "/v1/invitations",
            Some(&token),
            Some(json!({"email": "bob@corp.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(invitation["status"], "PENDING");
        assert_eq!(invitation["platformRole"], "MEMBER");

        let (status, member) = send(&app, "POST", "/v1/authentication/sign-up", None, Some(sign_up_body("bob@corp.com"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(member["platform"]["id"], owner["platform"]["id"]);
        assert_eq!(member["user"]["platformRole"], "MEMBER");

        // Members cannot invite
        let member_token = member["token"].as_str().unwrap().to_string();
        let (status, body) = send(
            &app,
            "POST",
            "/v1/invitations",
            Some(&member_token),
            Some(json!({"email": "eve@corp.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "PERMISSION_DENIED");

        let (status, listed) = send(&app, "GET", "/v1/invitations", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["status"], "ACCEPTED");
    }
}

mod openapi_tests {
    use super::*;

    #[tokio::test]
    async fn test_openapi_document_served() {
        let app = app(Edition::Community);
        let (status, doc) = send(&app, "GET", "/q/openapi", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/v1/authentication/sign-up"].is_object());
        assert!(doc["paths"]["/v1/invitations"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
