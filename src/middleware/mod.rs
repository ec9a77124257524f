//! HTTP middleware for CSRF protection, logging and error reporting.
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Request Log → Error Report → Catch Panic → CORS
//!         → Session → CSRF Issue → CSRF Enforce → Handler
//!                             ↓
//!                     403 CSRF token missing or invalid
//! ```
//!
//! The session layer lives in [`crate::session`]; everything else is here.

pub mod csrf;
pub mod errors;
pub mod ip;
pub mod logging;
pub mod request_id;

pub use csrf::{
    CSRF_HEADER, CSRF_REJECTION_MESSAGE, XSRF_HEADER, enforce_csrf, issue_csrf_token, issue_token,
};
pub use errors::{panic_response, report_errors};
pub use ip::{UNKNOWN_IP, extract_client_ip};
pub use logging::log_requests;
pub use request_id::{REQUEST_ID_HEADER, RequestId, assign_request_id};
