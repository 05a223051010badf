mod admin;
mod auth;
mod health_check;
mod users;

pub use admin::{admin_delete_user, admin_list_users};
pub use auth::{forgot_password, google_login, login, logout, refresh_token, register, reset_password};
pub use health_check::health_check;
pub use users::{
    change_password, current_user, list_users, send_mobile_otp, update_profile, user_profile,
    verify_mobile_otp,
};

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;

use crate::auth::TokenPair;
use crate::configuration::Environment;
use crate::middleware::ACCESS_TOKEN_COOKIE;
use crate::user::UserProfile;

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Envelope for every successful response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    pub fn respond(status: StatusCode, data: T, message: impl Into<String>) -> HttpResponse {
        HttpResponse::build(status).json(Self::new(status, data, message))
    }
}

/// Body of every response that logs a user in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionData {
    pub fn new(user: UserProfile, tokens: &TokenPair) -> Self {
        Self {
            user,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        }
    }
}

fn token_cookie(name: &'static str, value: String, environment: Environment) -> Cookie<'static> {
    let same_site = if environment.is_production() {
        SameSite::None
    } else {
        SameSite::Lax
    };

    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(environment.is_production())
        .same_site(same_site)
        .finish()
}

/// Sets both token cookies on the response
pub fn with_token_cookies(
    mut builder: HttpResponseBuilder,
    tokens: &TokenPair,
    environment: Environment,
) -> HttpResponseBuilder {
    builder
        .cookie(token_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            environment,
        ))
        .cookie(token_cookie(
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.clone(),
            environment,
        ));
    builder
}

/// Expires both token cookies on the client
pub fn without_token_cookies(
    mut builder: HttpResponseBuilder,
    environment: Environment,
) -> HttpResponseBuilder {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        let mut cookie = token_cookie(name, String::new(), environment);
        cookie.make_removal();
        builder.cookie(cookie);
    }
    builder
}
