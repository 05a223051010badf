/// Authentication Routes
///
/// Registration, login/logout, token refresh, password recovery and
/// federated login.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{with_token_cookies, without_token_cookies, ApiResponse, SessionData, REFRESH_TOKEN_COOKIE};
use crate::auth::{CredentialManager, IdentityVerifier, Registration};
use crate::configuration::ApplicationSettings;
use crate::email_client::Mailer;
use crate::error::AppError;
use crate::user::User;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Either field may identify the user
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct GoogleLoginRequest {
    pub credential: String,
}

/// POST /api/v1/auth/register
///
/// # Errors
/// - 400: invalid username, email, full name or password
/// - 409: username or email already taken
pub async fn register(
    form: web::Json<RegisterRequest>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let user = manager
        .register(Registration {
            username: form.username,
            email: form.email,
            full_name: form.full_name,
            password: form.password,
        })
        .await?;

    Ok(ApiResponse::respond(
        StatusCode::CREATED,
        user.profile(),
        "User registered successfully",
    ))
}

/// POST /api/v1/auth/login
///
/// The user may match either the username or the email; blank fields are
/// ignored.
///
/// # Errors
/// - 400: neither username nor email given
/// - 404: no such user
/// - 401: wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    manager: web::Data<CredentialManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let identifiers: Vec<&str> = [form.username.as_deref(), form.email.as_deref()]
        .into_iter()
        .flatten()
        .collect();

    let (user, tokens) = manager.login_any(&identifiers, &form.password).await?;

    Ok(with_token_cookies(HttpResponse::Ok(), &tokens, app.environment).json(ApiResponse::new(
        StatusCode::OK,
        SessionData::new(user.profile(), &tokens),
        "User logged in successfully",
    )))
}

/// POST /api/v1/auth/logout (authenticated)
pub async fn logout(
    user: web::ReqData<User>,
    manager: web::Data<CredentialManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    manager.logout(user.id).await?;

    Ok(without_token_cookies(HttpResponse::Ok(), app.environment).json(ApiResponse::new(
        StatusCode::OK,
        serde_json::json!({}),
        "User logged out",
    )))
}

/// POST /api/v1/auth/refresh-token
///
/// Takes the refresh token from the `refreshToken` cookie, else from the
/// JSON body. A blank cookie counts as absent. The presented token is
/// rotated out.
///
/// # Errors
/// - 401: missing, invalid, expired or already rotated token
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    manager: web::Data<CredentialManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token));

    let tokens = manager.refresh_token_pair(presented.as_deref()).await?;

    Ok(with_token_cookies(HttpResponse::Ok(), &tokens, app.environment).json(ApiResponse::new(
        StatusCode::OK,
        &tokens,
        "Access token refreshed",
    )))
}

/// POST /api/v1/auth/forgot-password
///
/// Answers the same way whether or not the email is registered.
///
/// # Errors
/// - 400: malformed email
/// - 503: the reset email could not be sent
pub async fn forgot_password(
    form: web::Json<ForgotPasswordRequest>,
    manager: web::Data<CredentialManager>,
    mailer: web::Data<dyn Mailer>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    manager
        .forgot_password(mailer.get_ref(), &app.base_url, &form.email)
        .await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        serde_json::json!({}),
        "If a user with that email exists, a password reset link has been sent.",
    ))
}

/// PATCH /api/v1/auth/reset-password/{token}
///
/// Sets the new password and logs the user in.
///
/// # Errors
/// - 400: token unknown, already used or expired
pub async fn reset_password(
    token: web::Path<String>,
    form: web::Json<ResetPasswordRequest>,
    manager: web::Data<CredentialManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let user = manager.consume_reset_token(&token, &form.password).await?;
    let tokens = manager.issue_token_pair(user.id).await?;

    Ok(with_token_cookies(HttpResponse::Ok(), &tokens, app.environment).json(ApiResponse::new(
        StatusCode::OK,
        SessionData::new(user.profile(), &tokens),
        "Password reset successful",
    )))
}

/// POST /api/v1/auth/google-login
///
/// # Errors
/// - 401: Google rejected the credential
pub async fn google_login(
    form: web::Json<GoogleLoginRequest>,
    manager: web::Data<CredentialManager>,
    identity: web::Data<dyn IdentityVerifier>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let external = identity.verify(&form.credential).await?;
    let (user, tokens) = manager.login_with_external_identity(external).await?;

    Ok(with_token_cookies(HttpResponse::Ok(), &tokens, app.environment).json(ApiResponse::new(
        StatusCode::OK,
        SessionData::new(user.profile(), &tokens),
        "User logged in with Google",
    )))
}
