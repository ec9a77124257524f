mod api;

pub use api::{CsrfTokenResponse, HealthResponse, StatusResponse};
