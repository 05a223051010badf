//! Middleware module
//!
//! Custom middleware for authentication, role checks and request logging.

mod admin_middleware;
mod jwt_middleware;
mod logger;

pub use admin_middleware::AdminMiddleware;
pub use jwt_middleware::{JwtMiddleware, ACCESS_TOKEN_COOKIE};
pub use logger::LoggerMiddleware;
