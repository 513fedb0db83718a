mod callback;
mod refresh;
mod start;
mod web_token;
mod whoami;

pub use callback::auth_callback;
pub use refresh::auth_refresh;
pub use start::auth_start;
pub use web_token::auth_web_token;
pub use whoami::me;
