//! Authentication integration tests.
//!
//! Drives the register/login/logout/me flow against a real server and checks
//! that every token failure produces the same 401 body.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::clock::Clock;
use gateway_test_utils::{TestGatewayServer, TEST_JWT_SECRET};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};
use waveguide_gateway::audit::UserAction;

async fn assert_generic_unauthorized(response: reqwest::Response, path: &str) -> Result<()> {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Bearer realm=\"waveguide-api\", error=\"invalid_token\""
    );

    let body: Value = response.json().await?;
    assert_eq!(body["status"], 401);
    assert_eq!(body["message"], "Unauthorized access");
    assert_eq!(body["path"], path);
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_register_login_me_logout_flow() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();

    // Register
    let response = client
        .post(format!("{}/api/v1/auth/register", server.url()))
        .json(&json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "analytical-engine",
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered: Value = response.json().await?;
    assert_eq!(registered["token_type"], "Bearer");
    assert_eq!(registered["username"], "ada");
    assert_eq!(registered["email"], "ada@example.com");

    // Login with the same credentials
    let response = client
        .post(format!("{}/api/v1/auth/login", server.url()))
        .json(&json!({"email": "ada@example.com", "password": "analytical-engine"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let login: Value = response.json().await?;
    let token = login["token"].as_str().unwrap().to_string();

    // The token carries the userId and email claims
    let claims = server.state().codec.verify(&token).unwrap();
    assert_eq!(claims.sub, "ada");
    assert_eq!(claims.email(), Some("ada@example.com"));
    assert!(claims.user_id().is_some());

    // Me
    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await?;
    assert_eq!(me["username"], "ada");
    assert_eq!(me["id"].as_str(), claims.user_id());

    // Logout revokes the token
    let response = client
        .post(format!("{}/api/v1/auth/logout", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(server.state().revocations.is_revoked(&token));

    // Revoked before its natural expiry
    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_generic_unauthorized(response, "/api/v1/auth/me").await?;

    // The registration token is unaffected
    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(registered["token"].as_str().unwrap())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();
    server
        .register(&client, "grace", "grace@example.com", "cobol-compiler")
        .await?;

    for (username, email) in [
        ("grace", "other@example.com"),
        ("hopper", "GRACE@example.com"),
    ] {
        let response = client
            .post(format!("{}/api/v1/auth/register", server.url()))
            .json(&json!({"username": username, "email": email, "password": "cobol-compiler"}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body: Value = response.json().await?;
        assert_eq!(body["status"], 409);
        assert_eq!(body["path"], "/api/v1/auth/register");
    }

    Ok(())
}

#[tokio::test]
async fn test_registration_validation_details() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/auth/register", server.url()))
        .json(&json!({"username": "x", "email": "nope", "password": "short"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Validation error");
    assert_eq!(body["details"].as_array().unwrap().len(), 3);

    // Malformed JSON uses the same error shape
    let response = client
        .post(format!("{}/api/v1/auth/register", server.url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], 400);

    Ok(())
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();
    server
        .register(&client, "ada", "ada@example.com", "analytical-engine")
        .await?;

    for (email, password) in [
        ("ada@example.com", "difference-engine"),
        ("nobody@example.com", "analytical-engine"),
    ] {
        let response = client
            .post(format!("{}/api/v1/auth/login", server.url()))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: Value = response.json().await?;
        assert_eq!(body["message"], "Invalid email or password");
    }

    Ok(())
}

#[tokio::test]
async fn test_token_expires_on_server_clock() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();
    let account = server
        .register(&client, "ada", "ada@example.com", "analytical-engine")
        .await?;
    let ttl = server.config().jwt_ttl_seconds;

    server.advance(chrono::Duration::seconds(ttl));
    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(&account.token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    server.advance(chrono::Duration::seconds(1));
    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(&account.token)
        .send()
        .await?;
    assert_generic_unauthorized(response, "/api/v1/auth/me").await?;

    Ok(())
}

#[tokio::test]
async fn test_forged_and_malformed_tokens_get_identical_401() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();
    let now = server.clock().unix_timestamp();
    let payload = json!({
        "sub": "ada",
        "iat": now,
        "exp": now + 3_600,
        "iss": "waveguide-management-system",
        "jti": "forged-1",
    });

    let wrong_key = encode(
        &Header::new(Algorithm::HS512),
        &payload,
        &EncodingKey::from_secret(&[42u8; 64]),
    )?;
    let wrong_alg = encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )?;
    let unsigned = format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?)
    );

    for token in [wrong_key, wrong_alg, unsigned, "garbage".to_string()] {
        let response = client
            .get(format!("{}/api/v1/auth/me", server.url()))
            .bearer_auth(&token)
            .send()
            .await?;
        assert_generic_unauthorized(response, "/api/v1/auth/me").await?;
    }

    // Missing header entirely
    let response = client
        .post(format!("{}/api/v1/auth/logout", server.url()))
        .send()
        .await?;
    assert_generic_unauthorized(response, "/api/v1/auth/logout").await?;

    Ok(())
}

#[tokio::test]
async fn test_valid_token_for_unknown_subject_is_rejected() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();

    // Correctly signed, but no such user in the directory
    let issued = server
        .state()
        .codec
        .issue("ghost", serde_json::Map::new(), chrono::Duration::hours(1))
        .unwrap();

    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(&issued.token)
        .send()
        .await?;
    assert_generic_unauthorized(response, "/api/v1/auth/me").await?;

    Ok(())
}

#[tokio::test]
async fn test_sweep_drops_revocation_after_natural_expiry() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();
    let account = server
        .register(&client, "ada", "ada@example.com", "analytical-engine")
        .await?;

    let response = client
        .post(format!("{}/api/v1/auth/logout", server.url()))
        .bearer_auth(&account.token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let revocations = &server.state().revocations;
    assert_eq!(revocations.sweep(), 0);
    assert_eq!(revocations.len(), 1);

    server.advance(chrono::Duration::seconds(server.config().jwt_ttl_seconds + 1));
    assert_eq!(revocations.sweep(), 1);
    assert!(revocations.is_empty());

    // Swept, but still rejected by its own expiry
    let response = client
        .get(format!("{}/api/v1/auth/me", server.url()))
        .bearer_auth(&account.token)
        .send()
        .await?;
    assert_generic_unauthorized(response, "/api/v1/auth/me").await?;

    Ok(())
}

#[tokio::test]
async fn test_auth_flows_are_audited() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();
    server
        .register(&client, "ada", "ada@example.com", "analytical-engine")
        .await?;

    // Failed logins leave no audit entry
    let response = client
        .post(format!("{}/api/v1/auth/login", server.url()))
        .json(&json!({"email": "ada@example.com", "password": "difference-engine"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let login: Value = client
        .post(format!("{}/api/v1/auth/login", server.url()))
        .json(&json!({"email": "ada@example.com", "password": "analytical-engine"}))
        .send()
        .await?
        .json()
        .await?;
    let token = login["token"].as_str().unwrap();

    let response = client
        .post(format!("{}/api/v1/auth/logout", server.url()))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let entries = server.audit_log().entries().await;
    let actions: Vec<_> = entries.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![UserAction::Registration, UserAction::Login, UserAction::Logout]
    );

    let user_id = server
        .state()
        .codec
        .verify(token)
        .unwrap()
        .user_id()
        .map(str::to_string);
    for entry in &entries {
        assert_eq!(entry.username, "ada");
        assert_eq!(entry.user_id.map(|id| id.to_string()), user_id);
    }

    Ok(())
}

#[tokio::test]
async fn test_unknown_email_login_pays_decoy_verify() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/auth/login", server.url()))
        .json(&json!({"email": "nobody@example.com", "password": "analytical-engine"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.state().login_decoy.uses(), 1);
    assert_eq!(server.audit_log().len().await, 0);

    Ok(())
}
