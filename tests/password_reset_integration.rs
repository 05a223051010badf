mod common;

use bolify::auth::{hash_token, PASSWORD_RESET_SUBJECT};
use bolify::store::UserStore;
use chrono::{Duration, Utc};
use common::{spawn_app, TestApp};
use serde_json::{json, Value};

fn token_from_last_email(app: &TestApp) -> String {
    let message = app.mailer.last().expect("No reset email sent");
    assert_eq!(message.subject, PASSWORD_RESET_SUBJECT);

    message
        .message
        .split("/reset-password/")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .expect("No reset link in email")
        .to_string()
}

async fn reset(app: &TestApp, token: &str, password: &str) -> reqwest::Response {
    app.client
        .patch(app.url(&format!("/auth/reset-password/{}", token)))
        .json(&json!({ "password": password }))
        .send()
        .await
        .expect("Failed to execute request.")
}

#[tokio::test]
async fn forgot_password_for_unknown_email_reports_success_and_sends_nothing() {
    let app = spawn_app();

    let response = app
        .post_json("/auth/forgot-password", &json!({"email": "ghost@x.com"}))
        .await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(app.mailer.count(), 0);
}

#[tokio::test]
async fn forgot_password_answers_identically_for_known_and_unknown_emails() {
    let app = spawn_app();
    app.register_alice().await;

    let known: Value = app
        .post_json("/auth/forgot-password", &json!({"email": "alice@x.com"}))
        .await
        .json()
        .await
        .unwrap();
    let unknown: Value = app
        .post_json("/auth/forgot-password", &json!({"email": "ghost@x.com"}))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(known, unknown);
    assert_eq!(app.mailer.count(), 1);
}

#[tokio::test]
async fn reset_flow_changes_password_and_logs_in() {
    let app = spawn_app();
    app.register_alice().await;

    app.post_json("/auth/forgot-password", &json!({"email": "alice@x.com"}))
        .await;
    let token = token_from_last_email(&app);

    let response = reset(&app, &token, "newpass").await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["data"]["accessToken"].is_string());
    assert_eq!(body["data"]["user"]["username"], "alice");

    assert_eq!(200, app.login("alice", "newpass").await.status().as_u16());
    assert_eq!(401, app.login("alice", "secret123").await.status().as_u16());
}

#[tokio::test]
async fn reset_token_cannot_be_used_twice() {
    let app = spawn_app();
    app.register_alice().await;
    app.post_json("/auth/forgot-password", &json!({"email": "alice@x.com"}))
        .await;
    let token = token_from_last_email(&app);

    assert_eq!(200, reset(&app, &token, "newpass").await.status().as_u16());

    let second = reset(&app, &token, "another").await;
    assert_eq!(400, second.status().as_u16());
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["code"], "RESET_TOKEN_INVALID");
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let app = spawn_app();
    app.register_alice().await;
    app.post_json("/auth/forgot-password", &json!({"email": "alice@x.com"}))
        .await;
    let token = token_from_last_email(&app);

    let alice = app.store.find_by_identifier("alice").await.unwrap().unwrap();
    app.store
        .set_password_reset(
            alice.id,
            Some(&hash_token(&token)),
            Some(Utc::now() - Duration::seconds(1)),
        )
        .await
        .unwrap();

    assert_eq!(400, reset(&app, &token, "newpass").await.status().as_u16());
    assert_eq!(200, app.login("alice", "secret123").await.status().as_u16());
}

#[tokio::test]
async fn unknown_reset_token_is_rejected() {
    let app = spawn_app();

    let response = reset(&app, &"ab".repeat(32), "newpass").await;

    assert_eq!(400, response.status().as_u16());
}
