/// Admin user management. Mounted behind `JwtMiddleware` and
/// `AdminMiddleware`.

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::users::PageQuery;
use super::ApiResponse;
use crate::auth::CredentialManager;
use crate::error::AppError;

/// GET /api/v1/admin/users
///
/// Full profiles, including contact details and role.
pub async fn admin_list_users(
    query: web::Query<PageQuery>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    let page = manager.list_users(query.page, query.limit).await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        page.map(|user| user.profile()),
        "All users fetched successfully",
    ))
}

/// DELETE /api/v1/admin/users/{user_id}
///
/// # Errors
/// - 404: no such user
pub async fn admin_delete_user(
    user_id: web::Path<Uuid>,
    manager: web::Data<CredentialManager>,
) -> Result<HttpResponse, AppError> {
    manager.delete_user(user_id.into_inner()).await?;

    Ok(ApiResponse::respond(
        StatusCode::OK,
        serde_json::json!({}),
        "User deleted successfully",
    ))
}
