mod common;

use bolify::store::UserStore;
use common::{spawn_app, TestApp};
use serde_json::{json, Value};

async fn update_me(app: &TestApp, access_token: &str, body: Value) -> reqwest::Response {
    app.client
        .patch(app.url("/users/me"))
        .bearer_auth(access_token)
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.")
}

async fn get_as(app: &TestApp, path: &str, access_token: &str) -> reqwest::Response {
    app.client
        .get(app.url(path))
        .bearer_auth(access_token)
        .send()
        .await
        .expect("Failed to execute request.")
}

// --- Profile Updates ---

#[tokio::test]
async fn update_profile_changes_given_fields() {
    let app = spawn_app();
    app.register_alice().await;
    let (access_token, _) = app.login_tokens("alice", "secret123").await;

    let response = update_me(
        &app,
        &access_token,
        json!({"fullName": "Alice Liddell", "username": "alice.l", "mobileNumber": "+15551234567"}),
    )
    .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["fullName"], "Alice Liddell");
    assert_eq!(body["data"]["username"], "alice.l");
    assert_eq!(body["data"]["mobileNumber"], "+15551234567");
    assert_eq!(body["data"]["email"], "alice@x.com");

    assert_eq!(200, app.login("alice.l", "secret123").await.status().as_u16());
}

#[tokio::test]
async fn update_profile_returns_409_for_taken_username() {
    let app = spawn_app();
    app.register_alice().await;
    let bob = app.register("bob", "bob@x.com", "secret123").await;
    assert_eq!(201, bob.status().as_u16());
    let (access_token, _) = app.login_tokens("alice", "secret123").await;

    let response = update_me(&app, &access_token, json!({"username": "bob"})).await;

    assert_eq!(409, response.status().as_u16());
    let alice = app.store.find_by_username("alice").await.unwrap();
    assert!(alice.is_some());
}

#[tokio::test]
async fn update_profile_returns_400_without_fields() {
    let app = spawn_app();
    app.register_alice().await;
    let (access_token, _) = app.login_tokens("alice", "secret123").await;

    let response = update_me(&app, &access_token, json!({})).await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn update_profile_requires_authentication() {
    let app = spawn_app();

    let response = app
        .client
        .patch(app.url("/users/me"))
        .json(&json!({"fullName": "Nobody"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Public Profiles ---

#[tokio::test]
async fn public_profile_hides_contact_details() {
    let app = spawn_app();
    app.register_alice().await;

    let response = app
        .client
        .get(app.url("/users/Alice"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("email").is_none());
    assert!(body["data"].get("mobileNumber").is_none());
}

#[tokio::test]
async fn public_profile_of_unknown_user_returns_404() {
    let app = spawn_app();

    let response = app
        .client
        .get(app.url("/users/nobody"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn user_listing_is_public_and_paginated() {
    let app = spawn_app();
    for (username, email) in [("anna", "anna@x.com"), ("bert", "bert@x.com"), ("cleo", "cleo@x.com")] {
        assert_eq!(201, app.register(username, email, "secret123").await.status().as_u16());
    }

    let response = app
        .client
        .get(app.url("/users?page=2&limit=2"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["totalDocs"], 3);
    assert_eq!(body["data"]["totalPages"], 2);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["docs"].as_array().unwrap().len(), 1);
    assert!(body["data"]["docs"][0].get("email").is_none());
}

// --- Admin Routes ---

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = spawn_app();
    app.register_alice().await;
    let (access_token, _) = app.login_tokens("alice", "secret123").await;

    let response = get_as(&app, "/admin/users", &access_token).await;

    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn admin_routes_require_authentication() {
    let app = spawn_app();

    let response = app
        .client
        .get(app.url("/admin/users"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn admin_lists_full_profiles_and_deletes_users() {
    let app = spawn_app();
    app.register_alice().await;
    app.create_admin("root", "root@x.com", "adminpass").await;
    let (admin_token, _) = app.login_tokens("root", "adminpass").await;

    let listing = get_as(&app, "/admin/users", &admin_token).await;
    assert_eq!(200, listing.status().as_u16());
    let body: Value = listing.json().await.unwrap();
    assert_eq!(body["data"]["totalDocs"], 2);
    assert!(body["data"]["docs"][0]["email"].is_string());

    let alice = app.store.find_by_username("alice").await.unwrap().unwrap();
    let delete = |id: String| {
        app.client
            .delete(app.url(&format!("/admin/users/{}", id)))
            .bearer_auth(&admin_token)
            .send()
    };

    let first = delete(alice.id.to_string()).await.expect("Failed to execute request.");
    assert_eq!(200, first.status().as_u16());
    assert_eq!(404, app.login("alice", "secret123").await.status().as_u16());

    let second = delete(alice.id.to_string()).await.expect("Failed to execute request.");
    assert_eq!(404, second.status().as_u16());
}
