use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CredentialManager, IdentityVerifier};
use crate::configuration::ApplicationSettings;
use crate::email_client::Mailer;
use crate::error::{AppError, ValidationError};
use crate::middleware::{AdminMiddleware, JwtMiddleware, LoggerMiddleware};
use crate::routes::{
    admin_delete_user, admin_list_users, change_password, current_user, forgot_password,
    google_login, health_check, list_users, login, logout, refresh_token, register,
    reset_password, send_mobile_otp, update_profile, user_profile, verify_mobile_otp,
};

pub fn run(
    listener: TcpListener,
    manager: CredentialManager,
    mailer: Arc<dyn Mailer>,
    identity: Arc<dyn IdentityVerifier>,
    application: ApplicationSettings,
) -> Result<Server, std::io::Error> {
    let manager = web::Data::new(manager);
    let mailer: web::Data<dyn Mailer> = web::Data::from(mailer);
    let identity: web::Data<dyn IdentityVerifier> = web::Data::from(identity);
    let application = web::Data::new(application);

    let server = HttpServer::new(move || {
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::from(ValidationError::InvalidFormat(format!("request body ({})", err)))
                .into()
        });

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(json_config)
            .app_data(manager.clone())
            .app_data(mailer.clone())
            .app_data(identity.clone())
            .app_data(application.clone())
            .service(
                web::scope("/api/v1")
                    .route("/health_check", web::get().to(health_check))
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/refresh-token", web::post().to(refresh_token))
                            .route("/forgot-password", web::post().to(forgot_password))
                            .route("/reset-password/{token}", web::patch().to(reset_password))
                            .route("/google-login", web::post().to(google_login))
                            .service(
                                web::resource("/logout")
                                    .wrap(JwtMiddleware::new(manager.get_ref().clone()))
                                    .route(web::post().to(logout)),
                            ),
                    )
                    .service(
                        web::scope("/users")
                            // Protected routes (require JWT authentication)
                            .service(
                                web::scope("/me")
                                    .wrap(JwtMiddleware::new(manager.get_ref().clone()))
                                    .route("", web::get().to(current_user))
                                    .route("", web::patch().to(update_profile))
                                    .route("/change-password", web::patch().to(change_password))
                                    .route("/send-mobile-otp", web::post().to(send_mobile_otp))
                                    .route("/verify-mobile-otp", web::post().to(verify_mobile_otp)),
                            )
                            // Public; the dynamic segment must come after /me
                            .route("", web::get().to(list_users))
                            .route("/{username}", web::get().to(user_profile)),
                    )
                    // Admin routes: the last wrap runs first, so JWT precedes the role check
                    .service(
                        web::scope("/admin")
                            .wrap(AdminMiddleware)
                            .wrap(JwtMiddleware::new(manager.get_ref().clone()))
                            .route("/users", web::get().to(admin_list_users))
                            .route("/users/{user_id}", web::delete().to(admin_delete_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
