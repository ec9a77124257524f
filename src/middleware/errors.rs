//! Central error reporting.
//!
//! Handlers and middleware turn failures into responses through
//! `IntoResponse for AppError`, which attaches an [`ErrorReport`]. This layer
//! sits near the top of the stack and writes one structured log record per
//! report. The `stack` field (the error's debug chain) is only logged outside
//! production.
//!
//! Panics are caught one layer further in by `CatchPanicLayer` with
//! [`panic_response`], so they are reported the same way.

use std::any::Any;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::config::DeploymentMode;
use crate::error::{AppError, ErrorReport};

/// Log the [`ErrorReport`] of an error response.
pub async fn report_errors(
    State(mode): State<DeploymentMode>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if let Some(report) = response.extensions().get::<ErrorReport>() {
        log_report(report, mode, method.as_str(), &path);
    }

    response
}

fn log_report(report: &ErrorReport, mode: DeploymentMode, method: &str, path: &str) {
    let stack = (!mode.is_production()).then_some(report.stack.as_str());
    let status = report.status.as_u16();
    let code = report.code.as_deref();

    if report.status.is_server_error() {
        error!(
            status,
            code,
            error = %report.error,
            stack,
            method,
            path,
            "Request failed"
        );
    } else {
        warn!(
            status,
            code,
            error = %report.error,
            stack,
            method,
            path,
            "Request rejected"
        );
    }
}

/// Panic handler for `CatchPanicLayer`: a 500 envelope, never the payload.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("handler panicked: {details}")).into_response()
}
