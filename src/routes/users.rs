/// User routes. The `/me` handlers sit behind `JwtMiddleware`, which
/// supplies the `User`; listing and profile lookup are public.

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::ApiResponse;
use crate::auth::CredentialManager;
use crate::email_client::Mailer;
use crate::error::AppError;
use crate::user::{ProfileChanges, User};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub mobile_number: Option<String>,
}

/// `?page=&limit=` of listings
#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub mobile_number: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

/// GET /api/v1/users/me
pub async fn current_user(user: web::ReqData<User>) -> HttpResponse {
    ApiResponse::respond(StatusCode::OK, user.profile(), "Current user fetched")
}

/// PATCH /api/v1/users/me
///
/// # Errors
/// - 400: no field given, or a malformed one
/// - 409: username taken by someone else
pub async fn update_profile(
    user: web::ReqData<User>,
    form: web::Json<UpdateProfileRequest>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let updated = manager
        .update_profile(
            user.id,
            ProfileChanges {
                full_name: form.full_name,
                username: form.username,
                mobile_number: form.mobile_number,
            },
        )
        .await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        updated.profile(),
        "User details updated successfully",
    ))
}

/// GET /api/v1/users
pub async fn list_users(
    query: web::Query<PageQuery>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    let page = manager.list_users(query.page, query.limit).await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        page.map(|user| user.public_profile()),
        "Authors fetched successfully",
    ))
}

/// GET /api/v1/users/{username}
///
/// # Errors
/// - 404: no such user
pub async fn user_profile(
    username: web::Path<String>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    let user = manager.find_by_username(&username).await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        user.public_profile(),
        "User profile fetched successfully",
    ))
}

/// PATCH /api/v1/users/me/change-password
///
/// # Errors
/// - 401: current password is wrong
pub async fn change_password(
    user: web::ReqData<User>,
    form: web::Json<ChangePasswordRequest>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    manager
        .change_password(user.id, &form.old_password, &form.new_password)
        .await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

/// POST /api/v1/users/me/send-mobile-otp
///
/// # Errors
/// - 400: malformed mobile number
/// - 503: the code could not be delivered
pub async fn send_mobile_otp(
    user: web::ReqData<User>,
    form: web::Json<SendOtpRequest>,
    manager: web::Data<CredentialManager>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, AppError> {
    manager
        .send_mobile_otp(mailer.get_ref(), user.id, &form.mobile_number)
        .await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        serde_json::json!({}),
        "OTP sent successfully",
    ))
}

/// POST /api/v1/users/me/verify-mobile-otp
///
/// # Errors
/// - 400: no pending code, it expired, or too many wrong guesses
/// - 401: wrong code
pub async fn verify_mobile_otp(
    user: web::ReqData<User>,
    form: web::Json<VerifyOtpRequest>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    let user = manager.verify_mobile_otp(user.id, &form.otp).await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        user.profile(),
        "Mobile number verified successfully",
    ))
}
