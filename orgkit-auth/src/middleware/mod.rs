pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, CurrentUser, RequestContext};
pub use rate_limit::{client_info, rate_limit_middleware};
