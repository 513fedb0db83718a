pub mod auth;
pub mod cors;

pub use auth::{auth_middleware, authorize, AuthSource, AuthUser, TokenKind};
pub use cors::{cors_middleware, create_cors_context, CorsContext};
