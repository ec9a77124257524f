mod csrf;
mod fallback;
mod health;

pub use csrf::csrf_token;
pub use fallback::not_found;
pub use health::{health_check, readiness_check, status};
