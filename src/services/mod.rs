pub mod tokens;

pub use tokens::{TokenIssuer, TokenResponse};
